//! Client-side state for podcast generation: the task-completion poller,
//! the audio playlist it feeds, and the stage selection used for merges.
//!
//! All three stores are plain, clonable handles over shared state.  They are
//! built once per session and passed to whatever UI layer needs them; the
//! only coupling between them is the poller pushing finished audio into the
//! playlist.

pub mod client;
pub mod error;
pub mod merge;
pub mod playlist;
pub mod poller;
pub mod query;
pub mod session;
pub mod source;
pub mod stages;
pub mod timer;

pub use error::{Error, Result};
pub use playlist::{AudioItem, AudioPlaylist, PlaylistEvent, PlaylistState};
pub use poller::{DropReason, PollerEvent, QueueItem, TaskPoller};
pub use query::{MergeRequester, TaskQuery};
pub use session::Session;
pub use stages::{SelectionEvent, StageSelectionTracker};
