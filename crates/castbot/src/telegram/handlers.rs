//! Dispatcher schema and handler chain builders

use teloxide::dispatching::{HandlerExt, UpdateFilterExt, UpdateHandler};
use teloxide::prelude::*;
use teloxide::types::{Contact, Message, User};

use castcore::registration::RegistrationHandler;
use castcore::storage::recipients::NewRecipient;

use crate::telegram::bot::Command;

/// Error type for handlers
pub type HandlerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Dependencies required by handlers
#[derive(Clone)]
pub struct HandlerDeps {
    pub registration: RegistrationHandler,
}

impl HandlerDeps {
    pub fn new(registration: RegistrationHandler) -> Self {
        Self { registration }
    }
}

/// Creates the main dispatcher schema for the Telegram bot.
///
/// Only private chats are handled: a recipient handle is the user's own
/// chat id.
pub fn schema(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    let deps_contact = deps.clone();
    let deps_commands = deps;

    dptree::entry()
        .branch(contact_handler(deps_contact))
        .branch(command_handler(deps_commands))
}

/// Profile fields of the sender, as stored on first contact.
pub fn profile_of(user: &User) -> NewRecipient {
    NewRecipient {
        telegram_id: user.id.0.to_string(),
        username: user.username.clone(),
        first_name: Some(user.first_name.clone()).filter(|s| !s.is_empty()),
        last_name: user.last_name.clone(),
    }
}

/// A shared contact is accepted only when it is the sender's own.
pub fn is_own_contact(contact: &Contact, sender: &User) -> bool {
    contact.user_id == Some(sender.id)
}

fn contact_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private() && msg.contact().is_some())
        .endpoint(move |msg: Message| {
            let deps = deps.clone();
            async move {
                let (Some(sender), Some(contact)) = (msg.from.as_ref(), msg.contact()) else {
                    return Ok(());
                };
                let handle = sender.id.0.to_string();

                if !is_own_contact(contact, sender) {
                    log::warn!("Ignoring contact of another user shared by {}", handle);
                    return Ok(());
                }

                deps.registration
                    .handle_contact(&handle, &contact.phone_number)
                    .await
                    .map(|_| ())
                    .map_err(HandlerError::from)
            }
        })
}

fn command_handler(deps: HandlerDeps) -> UpdateHandler<HandlerError> {
    Update::filter_message()
        .filter(|msg: Message| msg.chat.is_private())
        .filter_command::<Command>()
        .endpoint(move |msg: Message, cmd: Command| {
            let deps = deps.clone();
            async move {
                let Some(sender) = msg.from.as_ref() else {
                    return Ok(());
                };
                let handle = sender.id.0.to_string();
                log::info!("Command {:?} from {}", cmd, handle);

                let registration = &deps.registration;
                let result = match cmd {
                    Command::Start => registration.handle_start(&profile_of(sender)).await.map(|_| ()),
                    Command::Help => {
                        registration.handle_help(&handle).await;
                        Ok(())
                    }
                    Command::Status => registration.handle_status(&handle).await.map(|_| ()),
                    Command::Unsubscribe => registration.handle_unsubscribe(&handle).await.map(|_| ()),
                };
                result.map_err(HandlerError::from)
            }
        })
}
