//! Transform chain (C7, §4.7): sandboxed, per-call JS evaluation of a
//! skill's declared input transform.
//!
//! Grounded in the teacher's `astrid-hooks::handler` pattern of running
//! untrusted logic in a sandboxed, deterministic interpreter — here
//! realized with `boa_engine` (a pure-Rust JS interpreter) instead of the
//! teacher's WASM runtime, since the spec calls for "embedded interpreter
//! (sandboxed, deterministic, no network)" (Design Notes §9) and the pack
//! has no WASM use case for this kind of short-lived, args-in/args-out
//! script.

use std::cell::RefCell;
use std::rc::Rc;
use std::sync::Arc;

use boa_engine::object::ObjectInitializer;
use boa_engine::property::Attribute;
use boa_engine::{js_string, Context, JsArgs, JsError, JsResult, JsValue, NativeFunction, Source};
use serde_json::Value;

use crate::error::{SessionError, SessionResult};

/// A read-only binding transforms may use to invoke sibling skills via the
/// loopback surface — the script-visible `SkillService` of §4.7. Kept as a
/// trait so the transform module never depends on the concrete session or
/// HTTP machinery.
pub trait SkillInvoker: Send + Sync {
    /// Invoke `skill_name` with `args`, returning its JSON result, or an
    /// error string the script sees as a thrown `Error`.
    fn invoke(&self, skill_name: &str, args: Value) -> Result<Value, String>;
}

/// Inputs to one transform evaluation.
pub struct TransformInput<'a> {
    /// The named transform's script source.
    pub script: &'a str,
    /// The skill's input arguments before transformation.
    pub input_args: Value,
    /// The session's variables, exposed read-only to the script.
    pub session_variables: Value,
    /// The `SkillService` binding, if sibling-skill invocation is allowed
    /// for this transform.
    pub skill_service: Option<Arc<dyn SkillInvoker>>,
}

/// Output of a transform evaluation.
pub struct TransformOutput {
    /// The new args object the skill should actually run with.
    pub args: Value,
    /// `console.log`/`console.error` lines, in emission order, for the
    /// caller to fold into `skill_input_transformed` audit entries.
    pub console_lines: Vec<String>,
}

/// Evaluate `input.script` in a fresh `boa_engine` context.
///
/// Each call gets its own [`Context`]: no state survives between
/// transforms, and nothing reaches the network or filesystem — the script
/// can only read `input_args`/`session_variables`, call `console.*`, and
/// (if bound) `SkillService.invoke`.
///
/// `boa_engine::Context` is `!Send`; callers must run this on a dedicated
/// thread (e.g. `tokio::task::spawn_blocking`), never directly on an async
/// executor thread.
///
/// # Errors
///
/// Returns [`SessionError::TransformUndefined`] if the script fails to
/// parse or throws, or [`SessionError::TransformInvalidResult`] if it
/// evaluates to something other than a JSON object.
pub fn run_transform(input: TransformInput<'_>) -> SessionResult<TransformOutput> {
    let console_lines = Rc::new(RefCell::new(Vec::new()));
    let mut context = Context::default();

    register_console(&mut context, Rc::clone(&console_lines))
        .map_err(|e| SessionError::TransformUndefined(format!("console setup failed: {e}")))?;

    set_global_json(&mut context, "input_args", &input.input_args)?;
    set_global_json(&mut context, "session_variables", &input.session_variables)?;

    if let Some(service) = input.skill_service {
        register_skill_service(&mut context, service)
            .map_err(|e| SessionError::TransformUndefined(format!("SkillService setup failed: {e}")))?;
    }

    let result = context
        .eval(Source::from_bytes(input.script))
        .map_err(|e| SessionError::TransformUndefined(e.to_string()))?;

    let args = result
        .to_json(&mut context)
        .map_err(|e| SessionError::TransformUndefined(format!("result is not JSON-serializable: {e}")))?;

    if !args.is_object() {
        return Err(SessionError::TransformInvalidResult);
    }

    Ok(TransformOutput {
        args,
        console_lines: console_lines.borrow().clone(),
    })
}

fn set_global_json(context: &mut Context, name: &'static str, value: &Value) -> SessionResult<()> {
    let js_value = JsValue::from_json(value, context)
        .map_err(|e| SessionError::TransformUndefined(format!("invalid {name}: {e}")))?;
    context
        .register_global_property(js_string!(name), js_value, Attribute::all())
        .map_err(|e| SessionError::TransformUndefined(e.to_string()))
}

fn register_console(context: &mut Context, lines: Rc<RefCell<Vec<String>>>) -> JsResult<()> {
    let log_lines = Rc::clone(&lines);
    let log = NativeFunction::from_closure(move |_this, args, ctx| {
        log_lines.borrow_mut().push(render_console_args(args, ctx)?);
        Ok(JsValue::undefined())
    });

    let error_lines = Rc::clone(&lines);
    let error = NativeFunction::from_closure(move |_this, args, ctx| {
        error_lines.borrow_mut().push(format!("[error] {}", render_console_args(args, ctx)?));
        Ok(JsValue::undefined())
    });

    let console = ObjectInitializer::new(context)
        .function(log, js_string!("log"), 0)
        .function(error, js_string!("error"), 0)
        .build();

    context.register_global_property(js_string!("console"), console, Attribute::all())
}

fn register_skill_service(context: &mut Context, service: Arc<dyn SkillInvoker>) -> JsResult<()> {
    let invoke = NativeFunction::from_closure(move |_this, args, ctx| {
        let skill_name = args.get_or_undefined(0).to_string(ctx)?.to_std_string_escaped();
        let call_args = args.get_or_undefined(1).to_json(ctx)?;
        match service.invoke(&skill_name, call_args) {
            Ok(value) => JsValue::from_json(&value, ctx),
            Err(message) => Err(JsError::from_opaque(JsValue::from(js_string!(message)))),
        }
    });

    let skill_service = ObjectInitializer::new(context)
        .function(invoke, js_string!("invoke"), 2)
        .build();

    context.register_global_property(js_string!("SkillService"), skill_service, Attribute::all())
}

fn render_console_args(args: &[JsValue], ctx: &mut Context) -> JsResult<String> {
    let mut parts = Vec::with_capacity(args.len());
    for arg in args {
        parts.push(arg.to_string(ctx)?.to_std_string_escaped());
    }
    Ok(parts.join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn run(script: &str, input_args: Value) -> SessionResult<TransformOutput> {
        run_transform(TransformInput {
            script,
            input_args,
            session_variables: json!({}),
            skill_service: None,
        })
    }

    #[test]
    fn returns_new_args_object() {
        let output = run("({ ...input_args, extra: 1 })", json!({"a": 1})).unwrap();
        assert_eq!(output.args, json!({"a": 1, "extra": 1}));
    }

    #[test]
    fn reads_session_variables() {
        let output = run_transform(TransformInput {
            script: "({ region: session_variables.region })",
            input_args: json!({}),
            session_variables: json!({"region": "us-east-1"}),
            skill_service: None,
        })
        .unwrap();
        assert_eq!(output.args, json!({"region": "us-east-1"}));
    }

    #[test]
    fn throwing_script_is_transform_undefined() {
        let err = run("throw new Error('nope')", json!({})).unwrap_err();
        assert!(matches!(err, SessionError::TransformUndefined(_)));
    }

    #[test]
    fn non_object_result_is_rejected() {
        let err = run("42", json!({})).unwrap_err();
        assert!(matches!(err, SessionError::TransformInvalidResult));
    }

    #[test]
    fn console_log_lines_are_captured() {
        let output = run("console.log('hi', 1); ({})", json!({})).unwrap();
        assert_eq!(output.console_lines, vec!["hi 1".to_string()]);
    }

    #[test]
    fn skill_service_invoke_is_reachable() {
        struct Echo;
        impl SkillInvoker for Echo {
            fn invoke(&self, skill_name: &str, args: Value) -> Result<Value, String> {
                Ok(json!({"skill": skill_name, "args": args}))
            }
        }

        let output = run_transform(TransformInput {
            script: "SkillService.invoke('sibling', { x: 1 })",
            input_args: json!({}),
            session_variables: json!({}),
            skill_service: Some(Arc::new(Echo)),
        })
        .unwrap();
        assert_eq!(output.args, json!({"skill": "sibling", "args": {"x": 1}}));
    }
}
