//! `GET /events`: one long-lived Server-Sent Events stream per browser tab.

mod stream;

pub use stream::{events_handler, EventsQuery};
