//! Fixed user-facing messages.
//!
//! Kick reasons and command replies are centralised here so that every
//! crate shows the same wording. Messages are rendered with `Display`.

use std::fmt;

/// A message shown to a player (kick screen or chat).
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Message {
    /// Kick reason when the data store isn't ready or the user's permission
    /// data couldn't be loaded.
    LoadingError,
    /// Reply to a blocked vanilla `/op` or `/deop`.
    OpDisabled,
    /// The sender lacks the permission for a command.
    NoPermission,
    /// The command was malformed. Carries the usage line.
    Usage(String),
    /// No loaded user matches the given name.
    UserNotOnline(String),
    /// Reply to `user <name> getuuid`.
    UserUuid { name: String, uuid: String },
    GroupDoesNotExist,
    PrimaryGroupAlreadyHas,
    PrimaryGroupNotMember { label: String },
    PrimaryGroupSuccess { user: String, group: String },
}

impl fmt::Display for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::LoadingError => f.write_str(
                "Permissions data could not be loaded. Please try again later.",
            ),
            Self::OpDisabled => {
                f.write_str("The vanilla op system is disabled on this server.")
            }
            Self::NoPermission => {
                f.write_str("You do not have permission to use this command!")
            }
            Self::Usage(usage) => write!(f, "Usage: {usage}"),
            Self::UserNotOnline(name) => {
                write!(f, "User '{name}' is not loaded.")
            }
            Self::UserUuid { name, uuid } => {
                write!(f, "The UUID of '{name}' is '{uuid}'.")
            }
            Self::GroupDoesNotExist => f.write_str("That group does not exist!"),
            Self::PrimaryGroupAlreadyHas => {
                f.write_str("The user already has this group set as their primary group.")
            }
            Self::PrimaryGroupNotMember { label } => write!(
                f,
                "The user must be a member of the group first! Use '/{label} user <user> addgroup <group>'"
            ),
            Self::PrimaryGroupSuccess { user, group } => {
                write!(f, "{user}'s primary group was set to {group}.")
            }
        }
    }
}
