//! Commands grouped into one backend round trip by [`super::KvBackend::exec_atomic`].

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    SetIfAbsent { key: String, value: String },
    Delete { key: String },
    SetAdd { set: String, member: String },
    SetRemove { set: String, member: String },
}

/// Ordered list of commands; replies come back in the same order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Batch {
    commands: Vec<Command>,
}

impl Batch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_if_absent(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.commands.push(Command::SetIfAbsent {
            key: key.into(),
            value: value.into(),
        });
        self
    }

    pub fn delete(mut self, key: impl Into<String>) -> Self {
        self.commands.push(Command::Delete { key: key.into() });
        self
    }

    pub fn set_add(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(Command::SetAdd {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn set_remove(mut self, set: impl Into<String>, member: impl Into<String>) -> Self {
        self.commands.push(Command::SetRemove {
            set: set.into(),
            member: member.into(),
        });
        self
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}
