//! [`LogNotifier`] definition.

use service::{domain::user, notify::Event, Notifier};
use tracing as log;

/// [`Notifier`] writing every [`Event`] to the log.
///
/// Stands in for the chat transport, which delivers [`Event`]s on its own.
#[derive(Clone, Copy, Debug, Default)]
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn notify(&self, recipient: user::ChatId, event: Event) {
        log::info!(
            recipient = %recipient,
            listing_id = %event.listing_id(),
            "{event}",
        );
    }
}
