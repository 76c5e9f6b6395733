//! Built-in playbooks

use serde_json::Value;

use negfuzz_core::codes::ResponseCodeFamily;
use negfuzz_core::http::HttpMethod;
use negfuzz_core::operation::FieldType;
use negfuzz_core::report::FieldExpectations;
use negfuzz_core::strategy::FuzzingStrategy;

use super::{
    BodyPlaybook, BodySource, FieldPlaybook, HeaderPlaybook, HeaderValues, Playbook,
    StatefulCheck, StatefulPlaybook, ValueSource,
};

/// Required fields must be rejected; optional ones may be ignored or rejected,
/// but a value breaking the field's pattern must be rejected.
fn strict_when_required() -> FieldExpectations {
    FieldExpectations {
        required_fuzzed: ResponseCodeFamily::four_xx_bad_request(),
        optional_fuzzed: ResponseCodeFamily::two_xx_or_four_xx(),
        pattern_violation: Some(ResponseCodeFamily::four_xx_bad_request()),
    }
}

const NO_BODY: [HttpMethod; 2] = [HttpMethod::Get, HttpMethod::Delete];

#[must_use]
pub fn all() -> Vec<Playbook> {
    let mut playbooks: Vec<Playbook> = Vec::new();
    playbooks.extend(fields().into_iter().map(Playbook::Field));
    playbooks.extend(headers().into_iter().map(Playbook::Header));
    playbooks.extend(bodies().into_iter().map(Playbook::Body));
    playbooks.extend(stateful().into_iter().map(Playbook::Stateful));
    playbooks
}

fn fields() -> Vec<FieldPlaybook> {
    vec![
        FieldPlaybook {
            name: "TrailingSpacesInFields",
            description: "send trailing spaces",
            expectations: strict_when_required(),
            values: ValueSource::Fixed(vec![FuzzingStrategy::trail(" "), FuzzingStrategy::trail("\t")]),
            field_types: vec![FieldType::String],
            primitives_only: true,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "LeadingControlCharsInFields",
            description: "send leading control characters",
            expectations: FieldExpectations::uniform(ResponseCodeFamily::four_xx_bad_request()),
            values: ValueSource::Fixed(vec![
                FuzzingStrategy::prefix("\u{0000}"),
                FuzzingStrategy::prefix("\u{0007}"),
                FuzzingStrategy::prefix("\u{001B}"),
            ]),
            field_types: vec![FieldType::String],
            primitives_only: true,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "ZeroWidthCharsInValues",
            description: "insert zero-width characters",
            expectations: strict_when_required(),
            values: ValueSource::Fixed(vec![
                FuzzingStrategy::insert("\u{200B}"),
                FuzzingStrategy::insert("\u{FEFF}"),
            ]),
            field_types: vec![FieldType::String],
            primitives_only: true,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "NullValuesInFields",
            description: "send null",
            expectations: strict_when_required(),
            values: ValueSource::Fixed(vec![FuzzingStrategy::replace(Value::Null)]),
            field_types: vec![],
            primitives_only: false,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "TypeConfusionInFields",
            description: "send a value of the wrong type",
            expectations: FieldExpectations::uniform(ResponseCodeFamily::four_xx_bad_request()),
            values: ValueSource::TypeConfusion,
            field_types: vec![],
            primitives_only: true,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "BoundaryValuesInFields",
            description: "send a boundary value",
            expectations: FieldExpectations::uniform(ResponseCodeFamily::two_xx_or_four_xx()),
            values: ValueSource::Boundaries,
            field_types: vec![FieldType::String, FieldType::Integer, FieldType::Number],
            primitives_only: true,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "StringsOverMaxLength",
            description: "send a string longer than the maximum",
            expectations: FieldExpectations::uniform(ResponseCodeFamily::four_xx_bad_request()),
            values: ValueSource::OverMaxLength,
            field_types: vec![FieldType::String],
            primitives_only: true,
            skip_methods: NO_BODY.to_vec(),
        },
        FieldPlaybook {
            name: "RemoveFields",
            description: "remove the field",
            expectations: FieldExpectations {
                required_fuzzed: ResponseCodeFamily::four_xx_bad_request(),
                optional_fuzzed: ResponseCodeFamily::two_xx(),
                pattern_violation: None,
            },
            values: ValueSource::Remove,
            field_types: vec![],
            primitives_only: false,
            skip_methods: NO_BODY.to_vec(),
        },
    ]
}

fn headers() -> Vec<HeaderPlaybook> {
    vec![
        HeaderPlaybook {
            name: "RemoveHeaders",
            description: "remove the header",
            required_expected: ResponseCodeFamily::four_xx(),
            optional_expected: ResponseCodeFamily::two_xx(),
            values: HeaderValues::Remove,
            skip_methods: vec![],
        },
        HeaderPlaybook {
            name: "TrailingSpacesInHeaders",
            description: "send trailing spaces",
            required_expected: ResponseCodeFamily::two_xx_or_four_xx(),
            optional_expected: ResponseCodeFamily::two_xx_or_four_xx(),
            values: HeaderValues::Fixed(vec![FuzzingStrategy::trail("  ")]),
            skip_methods: vec![],
        },
        HeaderPlaybook {
            name: "VeryLargeHeaderValues",
            description: "send an oversized value",
            required_expected: ResponseCodeFamily::four_xx(),
            optional_expected: ResponseCodeFamily::four_xx(),
            values: HeaderValues::Fixed(vec![FuzzingStrategy::replace("a".repeat(16 * 1024))]),
            skip_methods: vec![],
        },
    ]
}

fn bodies() -> Vec<BodyPlaybook> {
    vec![
        BodyPlaybook {
            name: "EmptyJsonBody",
            description: "send an empty JSON object",
            expected: ResponseCodeFamily::four_xx_bad_request(),
            body: BodySource::Json("{}"),
            content_type: None,
            skip_methods: vec![],
        },
        BodyPlaybook {
            name: "MalformedJsonBody",
            description: "send a truncated JSON body",
            expected: ResponseCodeFamily::four_xx_bad_request(),
            body: BodySource::TruncatedExample,
            content_type: None,
            skip_methods: vec![],
        },
        BodyPlaybook {
            name: "NonJsonBody",
            description: "send a body that is not JSON",
            expected: ResponseCodeFamily::four_xx_bad_request(),
            body: BodySource::Raw("not json at all"),
            content_type: None,
            skip_methods: vec![],
        },
        BodyPlaybook {
            name: "ArrayInsteadOfObjectBody",
            description: "wrap the body in a JSON array",
            expected: ResponseCodeFamily::four_xx_bad_request(),
            body: BodySource::ExampleInArray,
            content_type: None,
            skip_methods: vec![],
        },
        BodyPlaybook {
            name: "UnsupportedContentType",
            description: "send the body with an unsupported content type",
            expected: ResponseCodeFamily::union([
                ResponseCodeFamily::Exact(415),
                ResponseCodeFamily::four_xx_bad_request(),
            ]),
            body: BodySource::Example,
            content_type: Some("application/x-negfuzz"),
            skip_methods: vec![],
        },
    ]
}

fn stateful() -> Vec<StatefulPlaybook> {
    vec![StatefulPlaybook {
        name: "DeletedResourcesNotAvailable",
        description: "get a resource deleted earlier in the run",
        expected: ResponseCodeFamily::union([
            ResponseCodeFamily::not_found(),
            ResponseCodeFamily::Exact(410),
        ]),
        check: StatefulCheck::DeletedResourcesNotAvailable,
    }]
}
