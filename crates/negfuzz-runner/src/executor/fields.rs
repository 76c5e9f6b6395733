//! Field-iterating executor
//!
//! For every field of the operation: check applicability, then send one
//! request per fuzz variant with only that field changed.

use serde_json::Value;

use negfuzz_core::mutation::{FieldPath, apply_strategy, field_exists, remove_field};
use negfuzz_core::operation::{FieldInfo, OperationData};
use negfuzz_core::report::{FieldExpectations, SkipReason};

use super::{Dispatch, ExecutionContext, ExecutorError, TestCase, Variant, service_data};

/// What a field playbook contributes to the iteration.
pub trait FieldFuzzing {
    fn name(&self) -> &str;

    /// Scenario text for one field, e.g. "send trailing spaces in field 'name'".
    fn scenario(&self, field: &FieldInfo) -> String;

    fn expectations(&self) -> &FieldExpectations;

    /// Whether the playbook applies to the field's schema.
    fn applies_to(&self, field: &FieldInfo) -> bool;

    /// Variants to send for `field`. Empty means there is nothing to fuzz with.
    fn variants(&self, field: &FieldInfo) -> Vec<Variant>;

    /// Objects and arrays are skipped unless this returns false.
    fn primitives_only(&self) -> bool {
        true
    }
}

/// Run `fuzzer` over every field of `op`.
pub fn execute_fields(ctx: &ExecutionContext, op: &OperationData, fuzzer: &dyn FieldFuzzing) {
    let payload: Option<Value> = serde_json::from_str(&op.payload).ok();
    for field in &op.fields {
        let case = ctx.test_case(fuzzer.name(), fuzzer.scenario(field), op);
        let path = match FieldPath::parse(&field.path) {
            Ok(path) => path,
            Err(e) => {
                ctx.run_test_case(&case, || Err(e.into()));
                continue;
            }
        };
        let variants = match check_applicable(ctx, op, fuzzer, field, &path, payload.as_ref()) {
            Ok(variants) => variants,
            Err(reason) => {
                ctx.report(case.skipped(reason));
                continue;
            }
        };
        let Some(doc) = payload.as_ref() else {
            continue;
        };
        for (i, variant) in variants.iter().enumerate() {
            let case = if i == 0 {
                case.clone()
            } else {
                ctx.test_case(fuzzer.name(), fuzzer.scenario(field), op)
            };
            if let Variant::Strategy(strategy) = variant {
                if let Some(reason) = strategy.skip_reason() {
                    ctx.report(case.skipped(SkipReason::Declined(reason.to_string())));
                    continue;
                }
            }
            ctx.run_test_case(&case, || {
                run_variant(ctx, op, fuzzer.expectations(), field, &path, doc, variant, &case)
            });
        }
    }
}

fn check_applicable(
    ctx: &ExecutionContext,
    op: &OperationData,
    fuzzer: &dyn FieldFuzzing,
    field: &FieldInfo,
    path: &FieldPath,
    payload: Option<&Value>,
) -> Result<Vec<Variant>, SkipReason> {
    if ctx.is_skipped_field(&field.path, path.leaf_name()) {
        return Err(SkipReason::ExplicitlySkipped);
    }
    if fuzzer.primitives_only() && !field.field_type.is_primitive() {
        return Err(SkipReason::NonPrimitive);
    }
    if field.discriminator {
        return Err(SkipReason::Discriminator);
    }
    if ctx.ref_data().controls(&op.path, &field.path) {
        return Err(SkipReason::RefDataControlled);
    }
    if !fuzzer.applies_to(field) {
        return Err(SkipReason::SchemaMismatch);
    }
    if !payload.is_some_and(|doc| field_exists(doc, path)) {
        return Err(SkipReason::FieldNotInPayload);
    }
    let variants = fuzzer.variants(field);
    if variants.is_empty() {
        return Err(SkipReason::NoFuzzValues);
    }
    Ok(variants)
}

#[allow(clippy::too_many_arguments)]
fn run_variant(
    ctx: &ExecutionContext,
    op: &OperationData,
    expectations: &FieldExpectations,
    field: &FieldInfo,
    path: &FieldPath,
    doc: &Value,
    variant: &Variant,
    case: &TestCase,
) -> Result<Option<negfuzz_core::TestCaseResult>, ExecutorError> {
    let (json, fuzzed_value) = match variant {
        Variant::Strategy(strategy) => {
            let fuzzed = apply_strategy(doc, path, strategy)?;
            (fuzzed.json, fuzzed.fuzzed_value)
        }
        Variant::Remove => (remove_field(doc, path)?, Value::Null),
    };
    let data = service_data(op, case)
        .payload(json.to_string())
        .tested_fields([field.path.clone()])
        .build();
    let exchange = match ctx.dispatch(case, &data)? {
        Dispatch::Planned => return Ok(None),
        Dispatch::Sent(exchange) => exchange,
    };
    let (kind, expected) = expectations.select(field.required, field.pattern.as_deref(), &fuzzed_value);
    Ok(Some(
        case.judge(op, exchange, expected)
            .with_context("field", field.path.clone())
            .with_context("variant", variant.describe())
            .with_context("expectation", format!("{kind:?}")),
    ))
}
