//! Scoped ownership of native resources.
//!
//! Device setup touches several kinds of native resource, each with its own
//! release call and its own "invalid" value:
//!
//! - kernel wait handles, closed with `CloseHandle` ([`ClosePtr`])
//! - reference-counted device interfaces, released with `Release` ([`ReleasePtr`])
//! - sensor sessions, shut down after a successful initialize ([`InitializedSession`])
//!
//! All three share one owner type, [`Owned`], parameterized by a zero-sized
//! finalizer strategy. The owner is move-only, finalizes at most once, never
//! finalizes a sentinel value and never lets a finalizer failure escape.
//!
//! ```ignore
//! let frame_event = native_owned::win::create_event(false, false)?;
//! let reader: ComPtr<IFrameReader> = ComPtr::new(Com(open_reader()?));
//! // A failure here closes `frame_event` and releases `reader` on the way out.
//! let session = InitializedSession::initialize(sensor).map_err(|(_, err)| err)?;
//! ```

mod error;
mod owned;
mod strategy;

#[cfg(windows)]
pub mod win;

pub use error::FinalizeError;
pub use owned::Owned;
pub use strategy::{
    Close, ClosePtr, CloseStrategy, Finalizer, InitializedSession, Release, ReleasePtr,
    ReleaseStrategy, Session, ShutdownStrategy,
};
