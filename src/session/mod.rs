//! Client-side conversation session: state, dispatch and projection.

mod dispatcher;
pub mod projection;
mod state;

pub use dispatcher::{Dispatcher, SharedSession, SubmitOutcome};
pub use projection::{View, project, render_text};
pub use state::SessionState;
