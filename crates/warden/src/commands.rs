//! Built-in command handling: the vanilla op/deop filter and the `warden`
//! command tree.
//!
//! ```text
//! /warden user <name> getuuid
//! /warden user <name> setprimarygroup <group>
//! ```

use std::sync::Arc;

use tracing::{info, warn};
use warden_protocol::{CommandEvent, Message};
use warden_session::Connection;
use warden_storage::{DataStore, Storage};

use crate::Player;

/// Label of the built-in command tree.
pub const COMMAND_LABEL: &str = "warden";

pub const PERMISSION_USER_GETUUID: &str = "warden.user.getuuid";
pub const PERMISSION_USER_SETPRIMARYGROUP: &str = "warden.user.setprimarygroup";

/// Namespaces a command may be qualified with, e.g. `/minecraft:op`.
const COMMAND_NAMESPACES: [&str; 3] = ["bukkit:", "spigot:", "minecraft:"];

/// Blocks the vanilla `op` and `deop` commands when ops are disabled.
#[derive(Debug, Clone, Copy)]
pub struct OpCommandFilter {
    ops_enabled: bool,
}

impl OpCommandFilter {
    pub fn new(ops_enabled: bool) -> Self {
        Self { ops_enabled }
    }

    /// Cancels the event and tells the player why if it's a blocked
    /// command. Returns `true` if it was blocked.
    pub fn filter(&self, event: &mut CommandEvent<Player>) -> bool {
        if self.ops_enabled || !is_op_command(&event.message) {
            return false;
        }
        event.cancelled = true;
        event.player.send_message(Message::OpDisabled);
        warn!(
            player_id = %event.player.id(),
            command = %event.message,
            "blocked vanilla op command"
        );
        true
    }
}

fn is_op_command(message: &str) -> bool {
    let message = message.to_lowercase();
    let mut command = message.strip_prefix('/').unwrap_or(&message);
    if let Some(rest) = COMMAND_NAMESPACES
        .iter()
        .find_map(|ns| command.strip_prefix(ns))
    {
        command = rest;
    }
    matches!(command.split(' ').next(), Some("op" | "deop"))
}

/// A parsed `/warden` command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WardenCommand {
    UserGetUuid { user: String },
    UserSetPrimaryGroup { user: String, group: String },
}

impl WardenCommand {
    /// Parses a chat message.
    ///
    /// Returns `None` if it isn't a `/warden` command at all, and
    /// `Some(Err(usage))` if it is but is malformed.
    pub fn parse(message: &str) -> Option<Result<Self, Message>> {
        let message = message.strip_prefix('/').unwrap_or(message);
        let mut args = message.split_whitespace();
        if !args
            .next()
            .is_some_and(|label| label.eq_ignore_ascii_case(COMMAND_LABEL))
        {
            return None;
        }
        let args: Vec<&str> = args.collect();

        let parsed = match args.as_slice() {
            ["user", user, action] if action.eq_ignore_ascii_case("getuuid") => {
                Ok(Self::UserGetUuid {
                    user: user.to_string(),
                })
            }
            ["user", user, action, group] if action.eq_ignore_ascii_case("setprimarygroup") => {
                Ok(Self::UserSetPrimaryGroup {
                    user: user.to_string(),
                    group: group.to_lowercase(),
                })
            }
            ["user", _, action, ..] if action.eq_ignore_ascii_case("setprimarygroup") => Err(
                Message::Usage(format!("/{COMMAND_LABEL} user <user> setprimarygroup <group>")),
            ),
            _ => Err(Message::Usage(format!(
                "/{COMMAND_LABEL} user <user> <getuuid|setprimarygroup>"
            ))),
        };
        Some(parsed)
    }

    pub fn permission(&self) -> &'static str {
        match self {
            Self::UserGetUuid { .. } => PERMISSION_USER_GETUUID,
            Self::UserSetPrimaryGroup { .. } => PERMISSION_USER_SETPRIMARYGROUP,
        }
    }

    /// Runs the command for `sender` and returns the reply.
    ///
    /// Operators may run every command. A primary group change is saved in
    /// the background.
    pub fn execute<S: Storage>(&self, store: &Arc<DataStore<S>>, sender: &Player) -> Message {
        if !sender.is_op() && !sender.has_permission(self.permission()) {
            return Message::NoPermission;
        }

        match self {
            Self::UserGetUuid { user } => match store.users().get_by_name(user) {
                Some(target) => Message::UserUuid {
                    name: target.name(),
                    uuid: target.id().to_string(),
                },
                None => Message::UserNotOnline(user.clone()),
            },
            Self::UserSetPrimaryGroup { user, group } => {
                let Some(target) = store.users().get_by_name(user) else {
                    return Message::UserNotOnline(user.clone());
                };
                if !store.group_exists(group) {
                    return Message::GroupDoesNotExist;
                }
                if target.primary_group().eq_ignore_ascii_case(group) {
                    return Message::PrimaryGroupAlreadyHas;
                }
                if !target.is_in_group(group) {
                    return Message::PrimaryGroupNotMember {
                        label: COMMAND_LABEL.to_string(),
                    };
                }

                target.set_primary_group(group.clone());
                info!(
                    player_id = %target.id(),
                    %group,
                    by = %sender.name(),
                    "primary group changed"
                );

                let store = Arc::clone(store);
                let saved = Arc::clone(&target);
                tokio::spawn(async move {
                    if let Err(e) = store.save_user(&saved).await {
                        warn!(player_id = %saved.id(), error = %e, "failed to save primary group change");
                    }
                });

                Message::PrimaryGroupSuccess {
                    user: target.name(),
                    group: group.clone(),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use warden_protocol::PlayerId;
    use warden_storage::MemoryStorage;

    fn command(message: &str, op: bool) -> CommandEvent<Player> {
        let player = Player::new(PlayerId::random(), "Alex", "world");
        player.set_op(op);
        CommandEvent::new(Arc::new(player), message)
    }

    #[test]
    fn test_is_op_command_variants() {
        for message in ["/op", "/op Steve", "/deop Steve", "/OP", "/minecraft:op Steve", "bukkit:deop", "/spigot:op"] {
            assert!(is_op_command(message), "{message} should be blocked");
        }
        for message in ["/opme", "/operator", "/deopall", "/help op", "/paper:op"] {
            assert!(!is_op_command(message), "{message} should pass");
        }
    }

    #[test]
    fn test_filter_ops_disabled_cancels_and_explains() {
        let filter = OpCommandFilter::new(false);
        let mut event = command("/op Steve", true);

        assert!(filter.filter(&mut event));
        assert!(event.cancelled);
        assert_eq!(event.player.last_message(), Some(Message::OpDisabled.to_string()));
    }

    #[test]
    fn test_filter_ops_enabled_passes_everything() {
        let filter = OpCommandFilter::new(true);
        let mut event = command("/op Steve", true);

        assert!(!filter.filter(&mut event));
        assert!(!event.cancelled);
    }

    #[test]
    fn test_parse_not_a_warden_command() {
        assert_eq!(WardenCommand::parse("/help"), None);
        assert_eq!(WardenCommand::parse(""), None);
    }

    #[test]
    fn test_parse_getuuid() {
        assert_eq!(
            WardenCommand::parse("/warden user Steve getuuid"),
            Some(Ok(WardenCommand::UserGetUuid { user: "Steve".into() }))
        );
    }

    #[test]
    fn test_parse_setprimarygroup_lowercases_group() {
        assert_eq!(
            WardenCommand::parse("/warden user Steve setprimarygroup Admin"),
            Some(Ok(WardenCommand::UserSetPrimaryGroup {
                user: "Steve".into(),
                group: "admin".into()
            }))
        );
    }

    #[test]
    fn test_parse_setprimarygroup_missing_group_is_usage() {
        assert!(matches!(
            WardenCommand::parse("/warden user Steve setprimarygroup"),
            Some(Err(Message::Usage(_)))
        ));
    }

    #[tokio::test]
    async fn test_execute_without_permission_is_refused() {
        let store = Arc::new(DataStore::new(MemoryStorage::new()));
        let sender = Player::new(PlayerId::random(), "Alex", "world");
        let cmd = WardenCommand::UserGetUuid { user: "Alex".into() };

        assert_eq!(cmd.execute(&store, &sender), Message::NoPermission);
    }

    #[tokio::test]
    async fn test_execute_getuuid_unknown_user() {
        let store = Arc::new(DataStore::new(MemoryStorage::new()));
        let sender = Player::new(PlayerId::random(), "Alex", "world");
        sender.set_op(true);
        let cmd = WardenCommand::UserGetUuid { user: "Nobody".into() };

        assert_eq!(
            cmd.execute(&store, &sender),
            Message::UserNotOnline("Nobody".into())
        );
    }

    #[tokio::test]
    async fn test_execute_setprimarygroup_checks_in_order() {
        let store = Arc::new(DataStore::new(MemoryStorage::new()));
        let id = PlayerId::random();
        store.load_user(id, "Steve").await.unwrap();
        let sender = Player::new(PlayerId::random(), "Alex", "world");
        sender.set_op(true);
        let set = |group: &str| WardenCommand::UserSetPrimaryGroup {
            user: "steve".into(),
            group: group.into(),
        };

        assert_eq!(set("admin").execute(&store, &sender), Message::GroupDoesNotExist);
        store.create_group("admin");
        assert_eq!(
            set("default").execute(&store, &sender),
            Message::PrimaryGroupAlreadyHas
        );
        assert!(matches!(
            set("admin").execute(&store, &sender),
            Message::PrimaryGroupNotMember { .. }
        ));
    }
}
