//! Tests for the binding layer: handle lifetime, thread attachment,
//! symbol caching, and the cross-thread promotion protocol

use super::*;
use crate::error::{InteropError, SymbolKind};
use crate::runtime::{ClassDef, ClassRef, ManagedRuntime, Signature};
use crate::value::{Value, ValueKind};
use std::sync::Arc;
use std::thread;

fn counter_runtime() -> Arc<ManagedRuntime> {
    let runtime = ManagedRuntime::new();
    runtime.define_class(
        ClassDef::new("Counter")
            .field("count", ValueKind::Int)
            .field("message", ValueKind::Str)
            .instance_method(
                "render",
                Signature::new(vec![], ValueKind::Str),
                |rt, obj, _args| {
                    let count = rt.field_value(obj, "count")?.as_int().unwrap_or(0).max(0);
                    let message = rt.field_value(obj, "message")?;
                    let text = message.as_str().unwrap_or("").repeat(count as usize);
                    Ok(Value::Str(text))
                },
            )
            .static_method(
                "bump",
                Signature::new(vec![ValueKind::Int], ValueKind::Int),
                |_rt, args| Ok(Value::Int(args[0].as_int().unwrap_or(0) + 1)),
            ),
    );
    Arc::new(runtime)
}

fn manager() -> (Arc<HandleManager>, ClassRef) {
    let runtime = counter_runtime();
    let manager = Arc::new(HandleManager::new(runtime));
    let class = manager.lookup_class("Counter").unwrap();
    (manager, class)
}

mod attachment_tests {
    use super::*;

    #[test]
    fn attach_detach_are_strictly_paired() {
        let (manager, _) = manager();
        assert!(!manager.is_attached());

        let attachment = manager.attach().unwrap();
        assert!(manager.is_attached());

        // Second attach without an intervening detach is misuse
        assert_eq!(manager.attach().unwrap_err(), InteropError::AlreadyAttached);

        manager.detach(attachment);
        assert!(!manager.is_attached());

        // Re-attach after detach is fine
        let attachment = manager.attach().unwrap();
        manager.detach(attachment);
    }

    #[test]
    fn attachment_guard_detaches_on_drop() {
        let (manager, _) = manager();
        {
            let _attachment = manager.attach().unwrap();
            assert!(manager.is_attached());
        }
        assert!(!manager.is_attached());
    }

    #[test]
    fn handle_operations_require_attachment() {
        let (manager, class) = manager();
        let count = manager.lookup_field(class, "count", ValueKind::Int).unwrap();

        let attachment = manager.attach().unwrap();
        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            manager.promote(&transient).unwrap()
        });
        manager.detach(attachment);

        // Everything fails with NotAttached once detached, even on a
        // perfectly live durable handle
        let err = manager.get_field(&durable, count).unwrap_err();
        assert_eq!(err, InteropError::NotAttached);
        let err = manager.release(&durable).unwrap_err();
        assert_eq!(err, InteropError::NotAttached);
    }

    #[test]
    fn worker_must_attach_before_first_handle_operation() {
        let (manager, class) = manager();
        let count = manager.lookup_field(class, "count", ValueKind::Int).unwrap();

        let attachment = manager.attach().unwrap();
        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            manager.promote(&transient).unwrap()
        });

        thread::scope(|s| {
            s.spawn(|| {
                // First action is a handle operation, not attach:
                // deterministic typed failure, not a crash
                let err = manager.get_field(&durable, count).unwrap_err();
                assert_eq!(err, InteropError::NotAttached);

                // After attaching, the same operation succeeds
                let out = manager
                    .with_attached(|| manager.get_field(&durable, count).unwrap())
                    .unwrap();
                assert_eq!(out, Value::Int(0));
            });
        });

        manager.release(&durable).unwrap();
        manager.detach(attachment);
    }

    #[test]
    fn host_dispatched_call_attaches_for_its_duration() {
        let (manager, class) = manager();

        assert!(!manager.is_attached());
        manager.enter_native_call(|scope| {
            // The host runtime dispatched us, so we count as attached
            assert!(manager.is_attached());
            manager.new_instance(scope, class).unwrap();
        });
        assert!(!manager.is_attached());
    }
}

mod transient_tests {
    use super::*;

    #[test]
    fn transient_dies_with_its_call() {
        let (manager, class) = manager();
        let attachment = manager.attach().unwrap();

        let escaped = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            assert!(transient.is_valid());
            transient
        });

        // The call has returned; the stored handle is flagged, never
        // silently treated as valid
        assert!(!escaped.is_valid());
        let count = manager.lookup_field(class, "count", ValueKind::Int).unwrap();
        let err = manager.get_field(&escaped, count).unwrap_err();
        assert!(matches!(err, InteropError::InvalidHandle { .. }));

        manager.detach(attachment);
    }

    #[test]
    fn transient_rejected_on_foreign_thread() {
        let (manager, class) = manager();
        let attachment = manager.attach().unwrap();

        manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            assert!(transient.is_valid());

            thread::scope(|s| {
                s.spawn(|| {
                    // Scope is still open, but this is the wrong thread
                    assert!(!transient.is_valid());
                    let err = manager
                        .with_attached(|| manager.promote(&transient).unwrap_err())
                        .unwrap();
                    assert!(matches!(err, InteropError::InvalidHandle { .. }));
                });
            });
        });

        manager.detach(attachment);
    }

    #[test]
    fn promote_outside_originating_call_fails() {
        let (manager, class) = manager();
        let attachment = manager.attach().unwrap();

        let escaped = manager
            .enter_native_call(|scope| manager.new_instance(scope, class).unwrap());
        let err = manager.promote(&escaped).unwrap_err();
        assert!(matches!(err, InteropError::InvalidHandle { .. }));

        manager.detach(attachment);
    }
}

mod durable_tests {
    use super::*;

    #[test]
    fn durable_usable_strictly_between_promote_and_release() {
        let (manager, class) = manager();
        let count = manager.lookup_field(class, "count", ValueKind::Int).unwrap();
        let attachment = manager.attach().unwrap();

        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            let durable = manager.promote(&transient).unwrap();
            manager.set_field(&durable, count, Value::Int(7)).unwrap();
            durable
        });

        // Valid after the originating call returned
        assert_eq!(manager.get_field(&durable, count).unwrap(), Value::Int(7));

        manager.release(&durable).unwrap();
        assert!(durable.is_released());

        let err = manager.get_field(&durable, count).unwrap_err();
        assert_eq!(err, InteropError::UseAfterRelease);

        manager.detach(attachment);
    }

    #[test]
    fn double_release_is_rejected() {
        let (manager, class) = manager();
        let attachment = manager.attach().unwrap();

        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            manager.promote(&transient).unwrap()
        });

        manager.release(&durable).unwrap();
        assert_eq!(
            manager.release(&durable).unwrap_err(),
            InteropError::DoubleRelease
        );

        manager.detach(attachment);
    }

    #[test]
    fn promotion_pins_against_collection() {
        let (manager, class) = manager();
        let runtime = Arc::clone(manager.runtime());
        let attachment = manager.attach().unwrap();

        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            manager.promote(&transient).unwrap()
        });
        let object = durable.resolve().unwrap();

        runtime.collect();
        assert!(runtime.contains(object));

        manager.release(&durable).unwrap();
        runtime.collect();
        assert!(!runtime.contains(object));

        manager.detach(attachment);
    }

    #[test]
    fn dropping_an_unreleased_handle_unpins_once() {
        let (manager, class) = manager();
        let runtime = Arc::clone(manager.runtime());
        let attachment = manager.attach().unwrap();

        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            manager.promote(&transient).unwrap()
        });
        let object = durable.resolve().unwrap();

        drop(durable);
        runtime.collect();
        assert!(!runtime.contains(object));

        manager.detach(attachment);
    }

    /// The original pattern end to end: set fields inside the call that
    /// created the object, promote, then observe the state from a
    /// different attached thread
    #[test]
    fn durable_crosses_threads_and_observes_writes() {
        let (manager, class) = manager();
        let count = manager.lookup_field(class, "count", ValueKind::Int).unwrap();
        let message = manager.lookup_field(class, "message", ValueKind::Str).unwrap();
        let render = manager
            .lookup_method(class, "render", &Signature::new(vec![], ValueKind::Str))
            .unwrap();

        // Thread A: create, fill, promote; never detaches meanwhile
        let attachment = manager.attach().unwrap();
        let durable = manager.enter_native_call(|scope| {
            let transient = manager.new_instance(scope, class).unwrap();
            manager.set_field(&transient, count, Value::Int(3)).unwrap();
            manager
                .set_field(&transient, message, Value::Str("x".into()))
                .unwrap();
            manager.promote(&transient).unwrap()
        });

        // Thread B: attach first, call through the durable handle
        thread::scope(|s| {
            s.spawn(|| {
                let out = manager
                    .with_attached(|| {
                        manager.call_instance_method(&durable, render, &[]).unwrap()
                    })
                    .unwrap();
                assert_eq!(out, Value::Str("xxx".into()));
            });
        });

        manager.release(&durable).unwrap();
        manager.detach(attachment);
    }
}

mod symbol_tests {
    use super::*;

    #[test]
    fn lookup_failures_are_recoverable() {
        let (manager, class) = manager();

        let err = manager.lookup_class("Missing").unwrap_err();
        assert_eq!(
            err,
            InteropError::SymbolNotFound {
                kind: SymbolKind::Class,
                name: "Missing".into(),
            }
        );

        // The manager stays usable after a lookup failure
        manager.lookup_field(class, "count", ValueKind::Int).unwrap();
    }

    #[test]
    fn load_time_and_on_demand_resolution_agree() {
        let runtime = counter_runtime();

        let binding = RuntimeBinding::on_load(Arc::clone(&runtime), &["Counter"]).unwrap();
        assert_eq!(binding.version_token(), BINDING_VERSION_1);
        let preloaded = binding.manager();

        let fresh = HandleManager::new(runtime);
        let sig = Signature::new(vec![ValueKind::Int], ValueKind::Int);

        let class_a = preloaded.lookup_class("Counter").unwrap();
        let class_b = fresh.lookup_class("Counter").unwrap();
        assert_eq!(class_a, class_b);

        assert_eq!(
            preloaded.lookup_method(class_a, "bump", &sig).unwrap(),
            fresh.lookup_method(class_b, "bump", &sig).unwrap()
        );
        assert_eq!(
            preloaded
                .lookup_field(class_a, "count", ValueKind::Int)
                .unwrap(),
            fresh.lookup_field(class_b, "count", ValueKind::Int).unwrap()
        );

        // Cached second lookup yields the identical ref
        assert_eq!(preloaded.lookup_class("Counter").unwrap(), class_a);
    }

    #[test]
    fn load_hook_fails_on_unresolvable_class() {
        let runtime = counter_runtime();
        let err = RuntimeBinding::on_load(runtime, &["Counter", "Ghost"]).unwrap_err();
        assert!(matches!(err, InteropError::SymbolNotFound { .. }));
    }

    #[test]
    fn static_calls_from_worker_use_preresolved_symbols() {
        let runtime = counter_runtime();
        let binding = RuntimeBinding::on_load(runtime, &["Counter"]).unwrap();
        let manager = Arc::clone(binding.manager());

        // Resolve everything at load time, the worker only uses refs
        let class = manager.lookup_class("Counter").unwrap();
        let bump = manager
            .lookup_method(class, "bump", &Signature::new(vec![ValueKind::Int], ValueKind::Int))
            .unwrap();

        let worker = thread::spawn(move || {
            manager
                .with_attached(|| {
                    manager
                        .call_static_method(class, bump, &[Value::Int(1)])
                        .unwrap()
                })
                .unwrap()
        });
        assert_eq!(worker.join().unwrap(), Value::Int(2));
    }
}
