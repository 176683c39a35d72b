//! Resource capabilities and the finalizer strategies built on them.

use crate::{FinalizeError, Owned};

/// A resource released by an explicit close call (kernel handles, readers).
pub trait Close {
    /// Whether this value is the kind's documented invalid value.
    fn is_invalid(&self) -> bool {
        false
    }

    fn close(self) -> Result<(), FinalizeError>;
}

/// A reference-counted interface. The owner holds exactly one reference and
/// gives it back with `release`.
pub trait Release {
    /// Whether this is a null interface pointer.
    fn is_null(&self) -> bool {
        false
    }

    fn release(self);
}

/// A session that is only valid between a successful `initialize` and `shutdown`.
pub trait Session {
    type InitError;

    fn initialize(&mut self) -> Result<(), Self::InitError>;

    fn shutdown(self) -> Result<(), FinalizeError>;
}

/// How an [`Owned`] value is finalized. Implemented by uninhabited tag types so
/// the choice is made at the type level.
pub trait Finalizer<T> {
    /// Short name used in log output.
    const KIND: &'static str;

    /// Sentinel values are stored but never finalized.
    fn is_sentinel(value: &T) -> bool;

    fn finalize(value: T) -> Result<(), FinalizeError>;
}

/// Finalize with [`Close::close`].
#[derive(Debug)]
pub enum CloseStrategy {}

/// Finalize with [`Release::release`].
#[derive(Debug)]
pub enum ReleaseStrategy {}

/// Finalize with [`Session::shutdown`].
#[derive(Debug)]
pub enum ShutdownStrategy {}

impl<T: Close> Finalizer<T> for CloseStrategy {
    const KIND: &'static str = "close";

    fn is_sentinel(value: &T) -> bool {
        value.is_invalid()
    }

    fn finalize(value: T) -> Result<(), FinalizeError> {
        value.close()
    }
}

impl<T: Release> Finalizer<T> for ReleaseStrategy {
    const KIND: &'static str = "release";

    fn is_sentinel(value: &T) -> bool {
        value.is_null()
    }

    fn finalize(value: T) -> Result<(), FinalizeError> {
        value.release();
        Ok(())
    }
}

impl<T: Session> Finalizer<T> for ShutdownStrategy {
    const KIND: &'static str = "shutdown";

    fn is_sentinel(_value: &T) -> bool {
        false
    }

    fn finalize(value: T) -> Result<(), FinalizeError> {
        value.shutdown()
    }
}

pub type ClosePtr<T> = Owned<T, CloseStrategy>;
pub type ReleasePtr<T> = Owned<T, ReleaseStrategy>;
pub type InitializedSession<T> = Owned<T, ShutdownStrategy>;

impl<T: Session> Owned<T, ShutdownStrategy> {
    /// Initialize `session` and take ownership only if it succeeds.
    ///
    /// On failure the value comes back with the error and `shutdown` is never
    /// called for it.
    pub fn initialize(session: T) -> Result<Self, (T, T::InitError)> {
        Self::initialize_with(session, T::initialize)
    }

    /// Like [`initialize`](Self::initialize) with a caller-supplied init step,
    /// for sessions whose start call takes arguments.
    ///
    /// On failure the untouched value comes back with the error and
    /// `shutdown` is never called for it.
    pub fn initialize_with<E>(
        mut session: T,
        init: impl FnOnce(&mut T) -> Result<(), E>,
    ) -> Result<Self, (T, E)> {
        match init(&mut session) {
            Ok(()) => Ok(Self::new(session)),
            Err(err) => Err((session, err)),
        }
    }
}
