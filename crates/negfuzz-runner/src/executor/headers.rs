//! Header-iterating executor

use negfuzz_core::codes::ResponseCodeFamily;
use negfuzz_core::http::Header;
use negfuzz_core::operation::{HeaderInfo, OperationData};
use negfuzz_core::report::SkipReason;

use super::{Dispatch, ExecutionContext, ExecutorError, TestCase, Variant, service_data};

/// What a header playbook contributes to the iteration.
pub trait HeaderFuzzing {
    fn name(&self) -> &str;

    fn scenario(&self, header: &HeaderInfo) -> String;

    /// Expected codes when `header` is fuzzed.
    fn expected(&self, header: &HeaderInfo) -> &ResponseCodeFamily;

    /// Variants to send for `header`. Empty means there is nothing to fuzz with.
    fn variants(&self, header: &HeaderInfo) -> Vec<Variant>;
}

/// Run `fuzzer` over every header of `op`.
pub fn execute_headers(ctx: &ExecutionContext, op: &OperationData, fuzzer: &dyn HeaderFuzzing) {
    for header in &op.headers {
        let case = ctx.test_case(fuzzer.name(), fuzzer.scenario(header), op);
        if ctx.is_skipped_header(&header.name) {
            ctx.report(case.skipped(SkipReason::ExplicitlySkipped));
            continue;
        }
        let variants = fuzzer.variants(header);
        if variants.is_empty() {
            ctx.report(case.skipped(SkipReason::NoFuzzValues));
            continue;
        }
        for (i, variant) in variants.iter().enumerate() {
            let case = if i == 0 {
                case.clone()
            } else {
                ctx.test_case(fuzzer.name(), fuzzer.scenario(header), op)
            };
            if let Variant::Strategy(strategy) = variant {
                if let Some(reason) = strategy.skip_reason() {
                    ctx.report(case.skipped(SkipReason::Declined(reason.to_string())));
                    continue;
                }
            }
            let expected = fuzzer.expected(header);
            ctx.run_test_case(&case, || run_variant(ctx, op, header, variant, expected, &case));
        }
    }
}

fn run_variant(
    ctx: &ExecutionContext,
    op: &OperationData,
    target: &HeaderInfo,
    variant: &Variant,
    expected: &ResponseCodeFamily,
    case: &TestCase,
) -> Result<Option<negfuzz_core::TestCaseResult>, ExecutorError> {
    let mut builder = service_data(op, case);
    match variant {
        Variant::Strategy(strategy) => {
            let headers: Vec<Header> = op
                .headers
                .iter()
                .map(|h| {
                    let value = if h.name == target.name {
                        strategy.process_str(&h.example)
                    } else {
                        h.example.clone()
                    };
                    Header::new(h.name.clone(), value)
                })
                .collect();
            builder = builder.headers(&headers).fuzzed_headers([target.name.clone()]);
        }
        Variant::Remove => {
            builder = builder.skipped_headers([target.name.clone()]);
        }
    }
    let data = builder.build();
    let exchange = match ctx.dispatch(case, &data)? {
        Dispatch::Planned => return Ok(None),
        Dispatch::Sent(exchange) => exchange,
    };
    Ok(Some(
        case.judge(op, exchange, expected)
            .with_context("header", target.name.clone())
            .with_context("variant", variant.describe()),
    ))
}

#[cfg(test)]
mod tests {
    use super::super::testing::{FakeCaller, context};
    use super::*;
    use negfuzz_core::http::{HttpMethod, find_header};
    use negfuzz_core::report::Outcome;
    use negfuzz_core::strategy::FuzzingStrategy;
    use std::sync::Arc;

    struct Fixed {
        expected: ResponseCodeFamily,
        variants: Vec<Variant>,
    }

    impl HeaderFuzzing for Fixed {
        fn name(&self) -> &str {
            "HeaderFixture"
        }
        fn scenario(&self, header: &HeaderInfo) -> String {
            format!("fuzz header '{}'", header.name)
        }
        fn expected(&self, _header: &HeaderInfo) -> &ResponseCodeFamily {
            &self.expected
        }
        fn variants(&self, _header: &HeaderInfo) -> Vec<Variant> {
            self.variants.clone()
        }
    }

    fn op() -> OperationData {
        let mut op = OperationData::new("/pets", HttpMethod::Get);
        op.headers = vec![
            HeaderInfo::new("X-Tenant", "acme").required(),
            HeaderInfo::new("X-Trace", "t-1"),
        ];
        op
    }

    #[test]
    fn one_request_per_header_with_only_that_header_fuzzed() {
        let caller = Arc::new(FakeCaller::answering(400));
        let (ctx, reporter) = context(caller.clone());
        let fuzzer = Fixed {
            expected: ResponseCodeFamily::four_xx(),
            variants: vec![FuzzingStrategy::prefix("\u{0}").into()],
        };
        execute_headers(&ctx, &op(), &fuzzer);
        let sent = caller.sent();
        assert_eq!(sent.len(), 2);
        assert_eq!(find_header(sent[0].headers(), "X-Tenant").unwrap().value, "\u{0}acme");
        assert_eq!(find_header(sent[0].headers(), "X-Trace").unwrap().value, "t-1");
        assert!(sent[0].is_fuzzed_header("x-tenant"));
        assert!(reporter.results().iter().all(|r| r.outcome == Outcome::Success));
    }

    #[test]
    fn remove_marks_header_skipped() {
        let caller = Arc::new(FakeCaller::answering(200));
        let (ctx, reporter) = context(caller.clone());
        let fuzzer = Fixed {
            expected: ResponseCodeFamily::four_xx(),
            variants: vec![Variant::Remove],
        };
        execute_headers(&ctx, &op(), &fuzzer);
        assert!(caller.sent()[0].is_skipped_header("X-Tenant"));
        assert!(reporter.results().iter().all(|r| r.outcome == Outcome::Error));
    }

    #[test]
    fn configured_skip_header() {
        let caller = Arc::new(FakeCaller::answering(400));
        let (ctx, reporter) = context(caller.clone());
        let ctx = ctx.with_skip_headers(["x-trace"]);
        let fuzzer = Fixed {
            expected: ResponseCodeFamily::four_xx(),
            variants: vec![FuzzingStrategy::trail(" ").into()],
        };
        execute_headers(&ctx, &op(), &fuzzer);
        assert_eq!(caller.sent().len(), 1);
        assert!(reporter
            .results()
            .iter()
            .any(|r| r.skip_reason == Some(SkipReason::ExplicitlySkipped)));
    }
}
