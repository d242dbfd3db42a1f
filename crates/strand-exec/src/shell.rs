pub fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// Builder for shell command lines handed to an execution service. Arguments
/// are quoted; raw fragments and connectors are inserted verbatim.
#[derive(Debug, Clone)]
pub struct ShellLine {
    parts: Vec<String>,
}

impl ShellLine {
    pub fn new(program: impl AsRef<str>) -> Self {
        Self {
            parts: vec![program.as_ref().to_string()],
        }
    }

    pub fn arg(mut self, arg: impl AsRef<str>) -> Self {
        self.parts.push(shell_quote(arg.as_ref()));
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            self.parts.push(shell_quote(arg.as_ref()));
        }
        self
    }

    /// An already-formed fragment, e.g. a scheduler directive that must not
    /// be quoted as a whole.
    pub fn raw(mut self, fragment: impl AsRef<str>) -> Self {
        self.parts.push(fragment.as_ref().to_string());
        self
    }

    pub fn and(mut self, other: ShellLine) -> Self {
        self.parts.push("&&".to_string());
        self.parts.extend(other.parts);
        self
    }

    pub fn to_shell_string(&self) -> String {
        self.parts.join(" ")
    }
}
