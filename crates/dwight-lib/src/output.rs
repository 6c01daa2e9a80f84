use std::io::{BufRead, Cursor, Stderr, StdinLock, Stdout, Write};

/// Terminal streams behind one handle so commands can be driven from tests.
pub trait ConsoleIO {
    type In: BufRead;
    type Out: Write;
    type Err: Write;

    fn stdin(&mut self) -> &mut Self::In;
    fn stdout(&mut self) -> &mut Self::Out;
    fn stderr(&mut self) -> &mut Self::Err;
}

/// The process's real stdin/stdout/stderr.
pub struct StdIO {
    stdin: StdinLock<'static>,
    stdout: Stdout,
    stderr: Stderr,
}

impl StdIO {
    #[must_use]
    pub fn new() -> Self {
        Self {
            stdin: std::io::stdin().lock(),
            stdout: std::io::stdout(),
            stderr: std::io::stderr(),
        }
    }
}

impl Default for StdIO {
    fn default() -> Self {
        Self::new()
    }
}

impl ConsoleIO for StdIO {
    type In = StdinLock<'static>;
    type Out = Stdout;
    type Err = Stderr;

    fn stdin(&mut self) -> &mut Self::In {
        &mut self.stdin
    }

    fn stdout(&mut self) -> &mut Self::Out {
        &mut self.stdout
    }

    fn stderr(&mut self) -> &mut Self::Err {
        &mut self.stderr
    }
}

/// In-memory streams: canned stdin, captured stdout/stderr.
#[derive(Default)]
pub struct BufferedIO {
    stdin: Cursor<Vec<u8>>,
    stdout: Vec<u8>,
    stderr: Vec<u8>,
}

impl BufferedIO {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stdin pre-filled with `input`, e.g. one chat message per line.
    #[must_use]
    pub fn with_stdin(input: &str) -> Self {
        Self {
            stdin: Cursor::new(input.as_bytes().to_vec()),
            ..Self::default()
        }
    }

    pub fn stdout_to_string(&self) -> String {
        String::from_utf8_lossy(&self.stdout).into_owned()
    }

    pub fn stderr_to_string(&self) -> String {
        String::from_utf8_lossy(&self.stderr).into_owned()
    }
}

impl ConsoleIO for BufferedIO {
    type In = Cursor<Vec<u8>>;
    type Out = Vec<u8>;
    type Err = Vec<u8>;

    fn stdin(&mut self) -> &mut Self::In {
        &mut self.stdin
    }

    fn stdout(&mut self) -> &mut Self::Out {
        &mut self.stdout
    }

    fn stderr(&mut self) -> &mut Self::Err {
        &mut self.stderr
    }
}
