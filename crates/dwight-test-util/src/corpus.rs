use std::fs;
use std::path::{Path, PathBuf};

/// Write `content` to `data_dir/bucket/name`, creating the bucket directory.
///
/// Returns the path of the written document.
pub fn write_doc(data_dir: &Path, bucket: &str, name: &str, content: &str) -> PathBuf {
    let dir = data_dir.join(bucket);
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, content).unwrap();
    path
}

/// Populate `data_dir` with one small document per bucket.
///
/// Each document uses vocabulary the others do not, so word-overlap
/// embedders can tell them apart.
pub fn sample_corpus(data_dir: &Path) {
    write_doc(
        data_dir,
        "1_customer_support",
        "tracking.md",
        "# Tracking\n\
         Customers can follow their container online.\n\
         ## Tracking portal\n\
         Enter the container number on the tracking portal to see vessel position.\n\
         ## Delays\n\
         Port congestion and customs inspection can delay delivery.",
    );
    write_doc(
        data_dir,
        "2_services_pricing",
        "services.md",
        "## Freight services\n\
         We move full container loads and consolidated cargo by sea and air.",
    );
    write_doc(
        data_dir,
        "3_sales_process",
        "quotes.md",
        "## Requesting a quote\n\
         Send origin, destination, cargo weight and incoterms to receive a quote within one business day.",
    );
    write_doc(
        data_dir,
        "4_internal_policies",
        "escalation.md",
        "## Escalation protocol\n\
         Staff escalate unresolved complaints to the operations manager within four hours.",
    );
}
