//! Built-in profile: multi-tenant JPA entity generation for Java services.
//!
//! Responses follow two conventions the prompts ask for explicitly:
//! - generation/revision output declares each file as a `FILE: <path>`
//!   line followed by a fenced code block;
//! - review output carries a `VERDICT: PASS` or `VERDICT: FAIL` line.

use std::path::Path;

use minijinja::Environment;
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

use super::{
    ContextSchema, FieldRules, FieldType, ProcessedResponse, ProfileMetadata, ResponseStatus,
    ReviewOutcome, ReviewVerdict, WorkflowProfile, WriteOp, WritePlan,
};
use crate::errors::{EngineError, Result};

static FILE_BLOCK_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?ms)^FILE:[ \t]*(?P<path>[^\n]+?)[ \t]*\n```[A-Za-z0-9_.+\-]*\n(?P<body>.*?)\n```")
        .unwrap()
});

static VERDICT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?mi)^\s*VERDICT:\s*(?P<verdict>PASS|FAIL)\b").unwrap());

const PLANNING_TEMPLATE: &str = r#"# Planning Request

Design the persistence layer for the `{{ entity }}` entity
(table `{{ table }}`, bounded context `{{ bounded_context }}`,
scope `{{ scope | default('domain') }}`).

The database schema is available at `{{ schema_file }}`.

Produce a numbered implementation plan covering:
1. Entity fields, types, and tenant-discriminator handling.
2. Repository and query surface.
3. Validation and constraint mapping.
4. Test coverage for the generated classes.

Follow the standards bundle supplied with this session. Write the plan as
markdown; do not emit code yet.
"#;

const GENERATION_TEMPLATE: &str = r#"# Generation Request

Implement the approved plan for the `{{ entity }}` entity
(table `{{ table }}`, bounded context `{{ bounded_context }}`).

Emit every file as a `FILE:` declaration followed by a fenced code block:

FILE: {{ entity }}.java
```java
// file content
```

Only relative paths are accepted. Apply the standards bundle and the
approved plan exactly.
"#;

const REVIEW_TEMPLATE: &str = r#"# Review Request

Review the generated code for the `{{ entity }}` entity against the
approved plan and the standards bundle.

Check: tenant isolation, constraint mapping against `{{ table }}`,
naming, and test coverage.

End the review with exactly one structured verdict line:

VERDICT: PASS
or
VERDICT: FAIL

followed by a short justification of each finding.
"#;

const REVISION_TEMPLATE: &str = r#"# Revision Request

The review of the `{{ entity }}` entity code failed. Address every
finding from the latest review response.

Re-emit each corrected file as a `FILE:` declaration followed by a fenced
code block, exactly as in the generation request. Unchanged files may be
omitted.
"#;

pub struct JavaEntityProfile {
    env: Environment<'static>,
}

impl JavaEntityProfile {
    pub fn new() -> Self {
        let mut env = Environment::new();
        env.add_template("planning", PLANNING_TEMPLATE)
            .expect("static template");
        env.add_template("generation", GENERATION_TEMPLATE)
            .expect("static template");
        env.add_template("review", REVIEW_TEMPLATE)
            .expect("static template");
        env.add_template("revision", REVISION_TEMPLATE)
            .expect("static template");
        Self { env }
    }

    fn render(&self, name: &str, context: &Map<String, Value>) -> Result<String> {
        let template = self
            .env
            .get_template(name)
            .map_err(|e| EngineError::Provider(format!("template '{name}' missing: {e}")))?;
        template
            .render(Value::Object(context.clone()))
            .map_err(|e| EngineError::Provider(format!("template '{name}' failed: {e}")))
    }

    fn extract_write_plan(text: &str) -> WritePlan {
        let writes = FILE_BLOCK_RE
            .captures_iter(text)
            .map(|caps| WriteOp {
                path: caps["path"].to_string(),
                content: caps["body"].to_string(),
            })
            .collect();
        WritePlan { writes }
    }

    fn process_code_response(&self, text: &str, kind: &str) -> Result<ProcessedResponse> {
        if text.trim().is_empty() {
            return Ok(ProcessedResponse {
                status: ResponseStatus::Error,
                messages: vec![format!("empty {kind} response")],
                write_plan: None,
            });
        }

        let plan = Self::extract_write_plan(text);
        let message = if plan.writes.is_empty() {
            format!("{kind} response received (no file blocks found)")
        } else {
            format!("{kind} response declared {} file(s)", plan.writes.len())
        };
        Ok(ProcessedResponse::ok(message).with_write_plan(plan))
    }
}

impl Default for JavaEntityProfile {
    fn default() -> Self {
        Self::new()
    }
}

impl WorkflowProfile for JavaEntityProfile {
    fn metadata(&self) -> ProfileMetadata {
        let mut schema = ContextSchema::new();
        schema.insert(
            "entity".to_string(),
            FieldRules::required(FieldType::String),
        );
        schema.insert("table".to_string(), FieldRules::required(FieldType::String));
        schema.insert(
            "bounded_context".to_string(),
            FieldRules::required(FieldType::String),
        );
        schema.insert(
            "scope".to_string(),
            FieldRules::optional(FieldType::String)
                .with_choices(&["domain", "service", "api", "full"]),
        );
        schema.insert(
            "schema_file".to_string(),
            FieldRules::required(FieldType::Path).must_exist(),
        );

        ProfileMetadata {
            name: "java-entity".to_string(),
            description: "Multi-tenant JPA entity generation for Java services".to_string(),
            context_schema: schema,
            can_regenerate_prompts: false,
        }
    }

    fn default_standards_provider_key(&self) -> String {
        "file-bundle".to_string()
    }

    fn planning_prompt(&self, context: &Map<String, Value>) -> Result<String> {
        self.render("planning", context)
    }

    fn generation_prompt(&self, context: &Map<String, Value>) -> Result<String> {
        self.render("generation", context)
    }

    fn review_prompt(&self, context: &Map<String, Value>) -> Result<String> {
        self.render("review", context)
    }

    fn revision_prompt(&self, context: &Map<String, Value>) -> Result<String> {
        self.render("revision", context)
    }

    fn process_planning_response(&self, text: &str) -> Result<ProcessedResponse> {
        if text.trim().is_empty() {
            return Ok(ProcessedResponse {
                status: ResponseStatus::Error,
                messages: vec!["empty planning response".to_string()],
                write_plan: None,
            });
        }
        Ok(ProcessedResponse::ok("planning response received"))
    }

    fn process_generation_response(
        &self,
        text: &str,
        _session_dir: &Path,
        _iteration: u32,
    ) -> Result<ProcessedResponse> {
        self.process_code_response(text, "generation")
    }

    fn process_review_response(&self, text: &str) -> Result<ReviewOutcome> {
        let Some(caps) = VERDICT_RE.captures(text) else {
            return Err(EngineError::Provider(
                "review response has no VERDICT: PASS|FAIL line".to_string(),
            ));
        };
        let verdict = if caps["verdict"].eq_ignore_ascii_case("PASS") {
            ReviewVerdict::Pass
        } else {
            ReviewVerdict::Fail
        };
        Ok(ReviewOutcome {
            approved: verdict == ReviewVerdict::Pass,
            verdict,
            messages: vec![format!("review verdict: {:?}", verdict)],
        })
    }

    fn process_revision_response(
        &self,
        text: &str,
        _session_dir: &Path,
        _iteration: u32,
    ) -> Result<ProcessedResponse> {
        self.process_code_response(text, "revision")
    }
}
