use agroscan_core::api::{Navigator, Route};
use tracing::debug;

/// Terminal stand-in for the app's navigation stack: routes become hints
/// printed for the user.
pub struct ConsoleNavigator;

impl Navigator for ConsoleNavigator {
    fn push(&self, route: Route) {
        debug!(%route, "push");
        if let Route::Chat { chat_id } = route {
            println!("Diagnosis started: chat {}", chat_id);
            println!("Run `agroscan history` to see it in your history.");
        }
    }

    fn replace(&self, route: Route) {
        debug!(%route, "replace");
        if route == Route::Login {
            eprintln!("Your session has expired. Run `agroscan login` to sign in again.");
        }
    }
}
