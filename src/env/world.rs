//! Full-featured host flavor: the broad simulation surface.

use crate::context::InteropContext;
use crate::host::HostValue;
use crate::registry::TableBuilder;

use super::HostHooks;

/// Register the full `game` module surface.
pub fn register(ctx: &mut InteropContext, hooks: &HostHooks) {
    let time = hooks.time.clone();
    let log_lines = hooks.log_lines.clone();
    let notify_lines = hooks.log_lines.clone();
    let cpu_used = hooks.cpu_used.clone();
    let cpu_charge = hooks.cpu_used.clone();
    let memory_object = hooks.memory_object.clone();

    let table = TableBuilder::new()
        .func("time", move |_args| {
            Ok(HostValue::Number(time.get() as f64))
        })
        .func("log", move |args| {
            cpu_charge.set(cpu_charge.get() + 0.2);
            match args.first() {
                Some(HostValue::String(s)) => {
                    log_lines.borrow_mut().push(s.clone());
                    Ok(HostValue::Undefined)
                }
                other => Err(format!("log: expected a string, got {other:?}")),
            }
        })
        .func("notify", move |args| match args.first() {
            Some(HostValue::String(s)) => {
                notify_lines.borrow_mut().push(format!("[notify] {s}"));
                Ok(HostValue::Undefined)
            }
            other => Err(format!("notify: expected a string, got {other:?}")),
        })
        .table(
            "cpu",
            TableBuilder::new()
                .func("getUsed", move |_args| {
                    Ok(HostValue::Number(cpu_used.get()))
                })
                .func("limit", |_args| Ok(HostValue::Number(20.0))),
        )
        .table(
            "memory",
            TableBuilder::new().func("get", move |_args| {
                Ok(HostValue::Object(memory_object.clone()))
            }),
        )
        .build();
    ctx.register_module("game", table);
}
