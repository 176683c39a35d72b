use std::fmt;
use std::marker::PhantomData;
use std::panic::{self, AssertUnwindSafe};

use tracing::{error, trace, warn};

use crate::Finalizer;

/// Move-only owner of one native value, finalized by `F` when dropped.
///
/// An owner is either empty or holds a value. Sentinel values (as defined by
/// `F`) may be held but are never passed to the finalizer.
pub struct Owned<T, F: Finalizer<T>> {
    value: Option<T>,
    _strategy: PhantomData<fn() -> F>,
}

impl<T, F: Finalizer<T>> Owned<T, F> {
    pub fn new(value: T) -> Self {
        Self {
            value: Some(value),
            _strategy: PhantomData,
        }
    }

    pub const fn empty() -> Self {
        Self {
            value: None,
            _strategy: PhantomData,
        }
    }

    pub fn get(&self) -> Option<&T> {
        self.value.as_ref()
    }

    pub fn get_mut(&mut self) -> Option<&mut T> {
        self.value.as_mut()
    }

    pub fn is_empty(&self) -> bool {
        self.value.is_none()
    }

    /// Holds a value that is not the kind's sentinel.
    pub fn is_valid(&self) -> bool {
        self.value.as_ref().is_some_and(|v| !F::is_sentinel(v))
    }

    /// Finalize the current value, then hold `value`.
    pub fn replace(&mut self, value: T) {
        self.reset();
        self.value = Some(value);
    }

    /// Finalize the current value now and leave the owner empty.
    pub fn reset(&mut self) {
        if let Some(value) = self.value.take() {
            finalize_quietly::<T, F>(value);
        }
    }

    /// Move ownership into a new owner, leaving this one empty.
    pub fn take(&mut self) -> Self {
        Self {
            value: self.value.take(),
            _strategy: PhantomData,
        }
    }

    /// Give up ownership without finalizing.
    pub fn into_inner(mut self) -> Option<T> {
        self.value.take()
    }
}

fn finalize_quietly<T, F: Finalizer<T>>(value: T) {
    if F::is_sentinel(&value) {
        trace!(kind = F::KIND, "Skipping sentinel value");
        return;
    }

    match panic::catch_unwind(AssertUnwindSafe(|| F::finalize(value))) {
        Ok(Ok(())) => trace!(kind = F::KIND, "Finalized native resource"),
        Ok(Err(err)) => warn!(kind = F::KIND, error = %err, "Finalizer reported an error"),
        Err(_) => error!(kind = F::KIND, "Finalizer panicked"),
    }
}

impl<T, F: Finalizer<T>> Drop for Owned<T, F> {
    fn drop(&mut self) {
        self.reset();
    }
}

impl<T, F: Finalizer<T>> Default for Owned<T, F> {
    fn default() -> Self {
        Self::empty()
    }
}

impl<T: fmt::Debug, F: Finalizer<T>> fmt::Debug for Owned<T, F> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Owned")
            .field("kind", &F::KIND)
            .field("value", &self.value)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use crate::{
        Close, ClosePtr, FinalizeError, InitializedSession, Release, ReleasePtr, Session,
    };

    use super::*;

    const INVALID_ID: u32 = u32::MAX;

    type Journal = Rc<RefCell<Vec<String>>>;

    struct MockHandle {
        id: u32,
        journal: Journal,
        fail: bool,
    }

    impl MockHandle {
        fn new(id: u32, journal: &Journal) -> Self {
            Self {
                id,
                journal: journal.clone(),
                fail: false,
            }
        }
    }

    impl Close for MockHandle {
        fn is_invalid(&self) -> bool {
            self.id == INVALID_ID || self.id == 0
        }

        fn close(self) -> Result<(), FinalizeError> {
            self.journal.borrow_mut().push(format!("close {}", self.id));
            if self.fail {
                return Err(FinalizeError::Close(format!("handle {} busy", self.id)));
            }
            Ok(())
        }
    }

    #[derive(Debug)]
    struct MockInterface {
        refs: Rc<Cell<u32>>,
    }

    impl Release for MockInterface {
        fn release(self) {
            self.refs.set(self.refs.get() - 1);
        }
    }

    struct MockSensor {
        refuse: bool,
        fail_shutdown: bool,
        initialized: bool,
        shutdowns: Rc<Cell<u32>>,
    }

    impl MockSensor {
        fn new(refuse: bool, shutdowns: &Rc<Cell<u32>>) -> Self {
            Self {
                refuse,
                fail_shutdown: false,
                initialized: false,
                shutdowns: shutdowns.clone(),
            }
        }
    }

    impl Session for MockSensor {
        type InitError = String;

        fn initialize(&mut self) -> Result<(), String> {
            if self.refuse {
                return Err("sensor not ready".to_string());
            }
            self.initialized = true;
            Ok(())
        }

        fn shutdown(self) -> Result<(), FinalizeError> {
            assert!(self.initialized, "shutdown without initialize");
            self.shutdowns.set(self.shutdowns.get() + 1);
            if self.fail_shutdown {
                return Err(FinalizeError::Shutdown("sensor unplugged".to_string()));
            }
            Ok(())
        }
    }

    struct Exploding;

    impl Close for Exploding {
        fn close(self) -> Result<(), FinalizeError> {
            panic!("driver crashed");
        }
    }

    fn journal() -> Journal {
        Rc::new(RefCell::new(Vec::new()))
    }

    fn entries(journal: &Journal) -> Vec<String> {
        journal.borrow().clone()
    }

    #[test]
    fn test_close_once_on_scope_exit() {
        let log = journal();
        {
            let owner = ClosePtr::new(MockHandle::new(7, &log));
            assert!(owner.is_valid());
        }
        assert_eq!(entries(&log), vec!["close 7"]);
    }

    #[test]
    fn test_sentinels_are_never_closed() {
        let log = journal();
        {
            let invalid = ClosePtr::new(MockHandle::new(INVALID_ID, &log));
            let null = ClosePtr::new(MockHandle::new(0, &log));
            assert!(!invalid.is_empty());
            assert!(!invalid.is_valid());
            assert!(!null.is_valid());
        }
        assert!(entries(&log).is_empty());
    }

    #[test]
    fn test_early_return_closes_acquired_resources() {
        fn open_pair(log: &Journal) -> Result<(ClosePtr<MockHandle>, ClosePtr<MockHandle>), String> {
            let first = ClosePtr::new(MockHandle::new(1, log));
            let second_ok = false;
            if !second_ok {
                return Err("second open failed".to_string());
            }
            Ok((first, ClosePtr::new(MockHandle::new(2, log))))
        }

        let log = journal();
        assert!(open_pair(&log).is_err());
        assert_eq!(entries(&log), vec!["close 1"]);
    }

    #[test]
    fn test_question_mark_path_closes_resources() {
        fn acquire(log: &Journal) -> Result<u32, String> {
            let handle = ClosePtr::new(MockHandle::new(3, log));
            let parsed: u32 = "not a number".parse().map_err(|_| "bad input".to_string())?;
            Ok(parsed + handle.get().map(|h| h.id).unwrap_or_default())
        }

        let log = journal();
        assert_eq!(acquire(&log), Err("bad input".to_string()));
        assert_eq!(entries(&log), vec!["close 3"]);
    }

    #[test]
    fn test_panic_unwind_closes_resources() {
        let log = journal();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            let _owner = ClosePtr::new(MockHandle::new(4, &log));
            panic!("frame pipeline aborted");
        }));
        assert!(result.is_err());
        assert_eq!(entries(&log), vec!["close 4"]);
    }

    #[test]
    fn test_take_leaves_source_empty() {
        let log = journal();
        let mut source = ClosePtr::new(MockHandle::new(5, &log));
        let moved = source.take();

        assert!(source.is_empty());
        assert!(!moved.is_empty());

        drop(source);
        assert!(entries(&log).is_empty(), "moved-from owner must not close");

        drop(moved);
        assert_eq!(entries(&log), vec!["close 5"]);
    }

    #[test]
    fn test_language_move_finalizes_once() {
        let log = journal();
        let source = ClosePtr::new(MockHandle::new(6, &log));
        let holder = vec![source];
        drop(holder);
        assert_eq!(entries(&log), vec!["close 6"]);
    }

    #[test]
    fn test_replace_finalizes_old_value_first() {
        let log = journal();
        let mut owner = ClosePtr::new(MockHandle::new(10, &log));

        owner.replace(MockHandle::new(11, &log));
        assert_eq!(entries(&log), vec!["close 10"]);
        assert_eq!(owner.get().map(|h| h.id), Some(11));

        drop(owner);
        assert_eq!(entries(&log), vec!["close 10", "close 11"]);
    }

    #[test]
    fn test_replace_over_sentinel_does_not_close_it() {
        let log = journal();
        let mut owner = ClosePtr::new(MockHandle::new(INVALID_ID, &log));
        owner.replace(MockHandle::new(12, &log));
        assert!(entries(&log).is_empty());
        drop(owner);
        assert_eq!(entries(&log), vec!["close 12"]);
    }

    #[test]
    fn test_reset_and_into_inner() {
        let log = journal();
        let mut owner = ClosePtr::new(MockHandle::new(20, &log));
        owner.reset();
        assert!(owner.is_empty());
        assert_eq!(entries(&log), vec!["close 20"]);
        owner.reset();
        assert_eq!(entries(&log).len(), 1);

        let kept = ClosePtr::new(MockHandle::new(21, &log)).into_inner();
        assert_eq!(kept.as_ref().map(|h| h.id), Some(21));
        assert_eq!(entries(&log).len(), 1, "into_inner must not close");
    }

    #[test]
    fn test_empty_and_default_are_noops() {
        let empty: ClosePtr<MockHandle> = ClosePtr::empty();
        let default: ClosePtr<MockHandle> = ClosePtr::default();
        assert!(empty.is_empty());
        assert!(!default.is_valid());
        assert!(empty.get().is_none());
    }

    #[test]
    fn test_close_error_is_swallowed() {
        let log = journal();
        let mut handle = MockHandle::new(30, &log);
        handle.fail = true;
        drop(ClosePtr::new(handle));
        assert_eq!(entries(&log), vec!["close 30"]);
    }

    #[test]
    fn test_finalizer_panic_is_swallowed() {
        let owner = ClosePtr::new(Exploding);
        drop(owner);
    }

    #[test]
    fn test_release_drops_exactly_one_reference() {
        let refs = Rc::new(Cell::new(2));
        {
            let _iface = ReleasePtr::new(MockInterface { refs: refs.clone() });
        }
        assert_eq!(refs.get(), 1);
    }

    #[test]
    fn test_release_on_error_path() {
        fn open(refs: &Rc<Cell<u32>>) -> Result<(), &'static str> {
            let _iface = ReleasePtr::new(MockInterface { refs: refs.clone() });
            Err("reader unavailable")
        }

        let refs = Rc::new(Cell::new(1));
        assert!(open(&refs).is_err());
        assert_eq!(refs.get(), 0);
    }

    #[test]
    fn test_session_shutdown_after_initialize() {
        let shutdowns = Rc::new(Cell::new(0));
        {
            let session = InitializedSession::initialize(MockSensor::new(false, &shutdowns))
                .map_err(|(_, err)| err)
                .unwrap();
            assert!(session.get().is_some_and(|s| s.initialized));
        }
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_failed_initialize_never_shuts_down() {
        let shutdowns = Rc::new(Cell::new(0));
        let result = InitializedSession::initialize(MockSensor::new(true, &shutdowns));
        let (sensor, err) = match result {
            Ok(_) => panic!("initialize should fail"),
            Err(pair) => pair,
        };
        assert_eq!(err, "sensor not ready");
        assert!(!sensor.initialized);
        drop(sensor);
        assert_eq!(shutdowns.get(), 0);
    }

    #[test]
    fn test_early_return_shuts_down_initialized_session() {
        fn start(shutdowns: &Rc<Cell<u32>>) -> Result<u32, String> {
            let session = InitializedSession::initialize(MockSensor::new(false, shutdowns))
                .map_err(|(_, err)| err)?;
            let stream_open = false;
            if !stream_open {
                return Err("color stream unavailable".to_string());
            }
            Ok(u32::from(session.is_valid()))
        }

        let shutdowns = Rc::new(Cell::new(0));
        assert_eq!(start(&shutdowns), Err("color stream unavailable".to_string()));
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_shutdown_error_is_swallowed() {
        let shutdowns = Rc::new(Cell::new(0));
        let mut sensor = MockSensor::new(false, &shutdowns);
        sensor.fail_shutdown = true;
        let session = InitializedSession::initialize(sensor)
            .map_err(|(_, err)| err)
            .unwrap();
        drop(session);
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_initialize_with_custom_step() {
        let shutdowns = Rc::new(Cell::new(0));
        let session = InitializedSession::initialize_with(
            MockSensor::new(false, &shutdowns),
            |sensor| -> Result<(), ()> {
                sensor.initialized = true;
                Ok(())
            },
        );
        assert!(session.is_ok());
        drop(session);
        assert_eq!(shutdowns.get(), 1);
    }

    #[test]
    fn test_debug_names_the_kind() {
        let refs = Rc::new(Cell::new(1));
        let empty: ReleasePtr<MockInterface> = ReleasePtr::empty();
        assert!(format!("{empty:?}").contains("release"));
        drop(ReleasePtr::new(MockInterface { refs: refs.clone() }));
        assert_eq!(refs.get(), 0);
    }
}
