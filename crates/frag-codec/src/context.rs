//! Per-thread decode context.
//!
//! serde's `Deserialize` has no way to receive the registry, so the codec
//! pushes a frame before structural decoding and [`Poly`](crate::Poly) reads
//! it back. Frames live in a thread-local stack: concurrent decodes on other
//! threads never see each other's registry or mode.

use std::cell::RefCell;
use std::marker::PhantomData;
use std::sync::Arc;

use frag_registry::TypeRegistry;

use crate::error::CodecError;
use crate::mode::CodecMode;

struct Frame {
    registry: Arc<TypeRegistry>,
    mode: CodecMode,
    failure: Option<Recorded>,
}

/// A nested failure and the message serde carried upward for it.
struct Recorded {
    error: CodecError,
    message: String,
}

thread_local! {
    static FRAMES: RefCell<Vec<Frame>> = const { RefCell::new(Vec::new()) };
}

/// An active decode frame. Popped on drop, including during unwinding.
pub(crate) struct DecodeScope {
    // Must be dropped on the thread that entered it.
    _not_send: PhantomData<*const ()>,
}

impl DecodeScope {
    pub(crate) fn enter(registry: Arc<TypeRegistry>, mode: CodecMode) -> Self {
        FRAMES.with(|frames| {
            frames.borrow_mut().push(Frame {
                registry,
                mode,
                failure: None,
            })
        });
        Self {
            _not_send: PhantomData,
        }
    }

    /// The recorded failure behind `cause`, the message of the error that
    /// reached the codec.
    ///
    /// serde may recover from a nested failure (an untagged enum trying its
    /// next variant) and fail later for an unrelated reason. The recorded
    /// failure is only reported when its message is the one that propagated.
    pub(crate) fn take_failure(&self, cause: &str) -> Option<CodecError> {
        FRAMES.with(|frames| {
            frames
                .borrow_mut()
                .last_mut()
                .and_then(|frame| frame.failure.take())
                .filter(|recorded| recorded.message == cause)
                .map(|recorded| recorded.error)
        })
    }
}

impl Drop for DecodeScope {
    fn drop(&mut self) {
        FRAMES.with(|frames| {
            frames.borrow_mut().pop();
        });
    }
}

/// Registry and mode of the innermost frame.
pub(crate) fn active() -> Option<(Arc<TypeRegistry>, CodecMode)> {
    FRAMES.with(|frames| {
        frames
            .borrow()
            .last()
            .map(|frame| (Arc::clone(&frame.registry), frame.mode))
    })
}

/// Remember why a nested value failed, under the message it propagates with.
///
/// A failure that wraps the one already recorded keeps the inner error, so an
/// unresolved tag deep inside nested values is still reported as such.
pub(crate) fn record_failure(err: CodecError, message: &str) {
    FRAMES.with(|frames| {
        let mut frames = frames.borrow_mut();
        let Some(frame) = frames.last_mut() else {
            return;
        };
        match frame.failure.as_mut() {
            Some(recorded) if wraps(&err, &recorded.message) => {
                recorded.message = message.to_string();
            }
            _ => {
                frame.failure = Some(Recorded {
                    error: err,
                    message: message.to_string(),
                });
            }
        }
    });
}

fn wraps(err: &CodecError, inner: &str) -> bool {
    matches!(err, CodecError::MalformedPayload { reason, .. } if reason == inner)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frames_nest_and_pop() {
        assert!(active().is_none());
        let outer = DecodeScope::enter(TypeRegistry::empty(), CodecMode::Annotated);
        {
            let _inner = DecodeScope::enter(TypeRegistry::empty(), CodecMode::TrustedSource);
            assert_eq!(active().unwrap().1, CodecMode::TrustedSource);
        }
        assert_eq!(active().unwrap().1, CodecMode::Annotated);
        drop(outer);
        assert!(active().is_none());
    }

    fn record(err: CodecError) -> String {
        let message = err.to_string();
        record_failure(err, &message);
        message
    }

    #[test]
    fn failure_is_taken_once() {
        let scope = DecodeScope::enter(TypeRegistry::empty(), CodecMode::Annotated);
        let message = record(CodecError::FragmentNotFound("first".into()));
        let err = scope.take_failure(&message).unwrap();
        assert!(matches!(err, CodecError::FragmentNotFound(name) if name == "first"));
        assert!(scope.take_failure(&message).is_none());
    }

    #[test]
    fn recovered_failure_is_not_reported_for_later_error() {
        let scope = DecodeScope::enter(TypeRegistry::empty(), CodecMode::Annotated);
        record(CodecError::FragmentNotFound("recovered".into()));
        assert!(scope.take_failure("missing field `count`").is_none());
    }

    #[test]
    fn latest_unrelated_failure_replaces_recovered_one() {
        let scope = DecodeScope::enter(TypeRegistry::empty(), CodecMode::Annotated);
        record(CodecError::FragmentNotFound("recovered".into()));
        let message = record(CodecError::FragmentNotFound("later".into()));
        let err = scope.take_failure(&message).unwrap();
        assert!(matches!(err, CodecError::FragmentNotFound(name) if name == "later"));
    }

    #[test]
    fn wrapping_failure_keeps_inner_cause() {
        let scope = DecodeScope::enter(TypeRegistry::empty(), CodecMode::Annotated);
        let inner = record(CodecError::FragmentNotFound("inner".into()));
        let outer = record(CodecError::malformed("app.Outer", &inner));
        let err = scope.take_failure(&outer).unwrap();
        assert!(matches!(err, CodecError::FragmentNotFound(name) if name == "inner"));
    }

    #[test]
    fn frames_are_per_thread() {
        let _scope = DecodeScope::enter(TypeRegistry::empty(), CodecMode::TrustedSource);
        let seen = std::thread::spawn(|| active().is_some()).join().unwrap();
        assert!(!seen);
    }

    #[test]
    fn failure_without_frame_is_dropped() {
        record_failure(CodecError::FragmentNotFound("nowhere".into()), "nowhere");
        assert!(active().is_none());
    }
}
