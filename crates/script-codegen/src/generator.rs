use plan_ir::{FillValue, PlanStep, ScrapePlan, ValidationType};
use scry_core_types::{PatchKnobs, PatchSet};
use tracing::debug;

use crate::errors::CodegenError;
use crate::python::{bool_literal, comment_text, string_literal};
use crate::template::{FOOTER, HEADER, RUNTIME};
use crate::types::GeneratedScript;

const BODY_INDENT: &str = "            ";
const STEP_INDENT: &str = "                ";
const COMMENT_WIDTH: usize = 60;

/// Compiles (optimized plan, patch set) pairs into Playwright scripts
#[derive(Debug, Clone, Default)]
pub struct CodeGenerator;

impl CodeGenerator {
    pub fn new() -> Self {
        Self
    }

    /// Byte-identical output for identical inputs
    pub fn generate(
        &self,
        plan: &ScrapePlan,
        patches: &PatchSet,
    ) -> Result<GeneratedScript, CodegenError> {
        let knobs = patches.knobs();
        let extraction = match plan.extraction() {
            Some(spec) => serde_json::to_string(spec)?,
            None => "{}".to_string(),
        };

        let mut source = String::with_capacity(8 * 1024);
        source.push_str(HEADER);
        source.push_str(&format!(
            "EXTRACTION_SPEC = json.loads({})\n",
            string_literal(&extraction)
        ));
        source.push_str(RUNTIME);

        if knobs.wait_load_state {
            line(&mut source, BODY_INDENT, "settle(page)");
        }
        if knobs.handle_cookie_banner {
            line(&mut source, BODY_INDENT, "dismiss_consent(page)");
        }

        let mut seen_navigation = false;
        for (index, planned) in plan.steps().iter().enumerate() {
            let step = match knobs.selector_for(index) {
                Some(selector) => planned.step.with_selector(selector),
                None => planned.step.clone(),
            };
            let first_navigation = matches!(step, PlanStep::Navigate { .. })
                && !std::mem::replace(&mut seen_navigation, true);
            render_step(&mut source, index, &step, &knobs, first_navigation);
        }

        source.push_str(FOOTER);
        let script = GeneratedScript::python(source);
        debug!(steps = plan.len(), digest = %script.digest, "script generated");
        Ok(script)
    }
}

fn line(out: &mut String, indent: &str, code: &str) {
    out.push_str(indent);
    out.push_str(code);
    out.push('\n');
}

fn locator(selector: &str) -> String {
    format!("page.locator({}).first", string_literal(selector))
}

fn render_step(
    out: &mut String,
    index: usize,
    step: &PlanStep,
    knobs: &PatchKnobs,
    first_navigation: bool,
) {
    let kind = step.kind();
    let described = match step {
        PlanStep::Navigate { url } => url.as_str(),
        PlanStep::KeyPress { key, .. } => key.as_str(),
        other => other.selector().unwrap_or_default(),
    };
    out.push('\n');
    line(
        out,
        BODY_INDENT,
        &format!("# step {index}: {kind} {}", comment_text(described, COMMENT_WIDTH)),
    );
    line(out, BODY_INDENT, &format!("def step_{index}():"));
    for code in step_body(step, knobs, first_navigation) {
        line(out, STEP_INDENT, &code);
    }
    let selector = step
        .selector()
        .map(string_literal)
        .unwrap_or_else(|| "None".to_string());
    line(
        out,
        BODY_INDENT,
        &format!(
            "run_step(page, {index}, \"{kind}\", {selector}, {}, step_{index})",
            bool_literal(step.is_critical())
        ),
    );
}

fn step_body(step: &PlanStep, knobs: &PatchKnobs, first_navigation: bool) -> Vec<String> {
    match step {
        PlanStep::Navigate { url } => {
            let mut body = vec![format!("page.goto({})", string_literal(url))];
            if knobs.wait_load_state {
                body.push("settle(page)".to_string());
            }
            if knobs.handle_cookie_banner && first_navigation {
                body.push("dismiss_consent(page)".to_string());
            }
            body
        }
        PlanStep::Click { selector, frame } => {
            let target = match frame {
                Some(frame) => format!(
                    "page.frame_locator({}).locator({}).first",
                    string_literal(frame),
                    string_literal(selector)
                ),
                None => locator(selector),
            };
            vec![format!("{target}.click()")]
        }
        PlanStep::Fill { selector, value } => {
            let text = match value {
                FillValue::Literal(text) => string_literal(text),
                FillValue::Secret(name) => {
                    format!("os.environ[{}]", string_literal(&FillValue::env_var(name)))
                }
            };
            vec![format!("{}.fill({text})", locator(selector))]
        }
        PlanStep::Select { selector, value } => vec![format!(
            "{}.select_option({})",
            locator(selector),
            string_literal(value)
        )],
        PlanStep::Hover { selector } => vec![
            format!("{}.hover()", locator(selector)),
            "page.wait_for_timeout(500)".to_string(),
        ],
        PlanStep::KeyPress { key, selector } => match selector {
            Some(selector) => vec![format!(
                "{}.press({})",
                locator(selector),
                string_literal(key)
            )],
            None => vec![format!("page.keyboard.press({})", string_literal(key))],
        },
        PlanStep::Upload {
            selector,
            file_path,
        } => vec![format!(
            "{}.set_input_files({})",
            locator(selector),
            string_literal(file_path)
        )],
        PlanStep::WaitFor {
            selector,
            state,
            timeout_ms,
        } => vec![format!(
            "{}.wait_for(state=\"{}\", timeout={})",
            locator(selector),
            state.as_str(),
            timeout_ms.saturating_add(knobs.extra_wait_ms)
        )],
        PlanStep::Validate {
            selector,
            validation,
            expected_text,
            expected_count,
            ..
        } => {
            let presence = format!(
                "{}.wait_for(state=\"attached\", timeout=STEP_TIMEOUT_MS)",
                locator(selector)
            );
            let check = match (validation, expected_text, expected_count) {
                (ValidationType::Absence, _, _) => format!(
                    "{}.wait_for(state=\"detached\", timeout=STEP_TIMEOUT_MS)",
                    locator(selector)
                ),
                (ValidationType::Text, Some(text), _) => format!(
                    "expect_text(page, {}, {})",
                    string_literal(selector),
                    string_literal(text)
                ),
                (ValidationType::Count, _, Some(count)) => format!(
                    "expect_count(page, {}, {count})",
                    string_literal(selector)
                ),
                _ => presence,
            };
            vec![check]
        }
    }
}
