// Formatter tests - block extraction from streamed model turns

use lastmile_agent::config::OutputFormat;
use lastmile_agent::formatter::{FormattedBlock, ResponseFormatter, split_sections};
use lastmile_agent::model::{FinishReason, ModelChunk, ToolCallChunk};
use serde_json::json;

fn feed(formatter: &mut ResponseFormatter, chunks: &[ModelChunk]) -> Vec<FormattedBlock> {
    chunks.iter().flat_map(|chunk| formatter.push(chunk)).collect()
}

#[test]
fn nothing_is_emitted_before_the_turn_finishes() {
    let mut formatter = ResponseFormatter::default();
    let blocks = feed(
        &mut formatter,
        &[
            ModelChunk::text("Reasoning: driver "),
            ModelChunk::text("stuck in traffic "),
            ModelChunk::text("Final Resolution: ETA updated"),
        ],
    );
    assert!(blocks.is_empty());

    let blocks = formatter.push(&ModelChunk::finished(FinishReason::Stop));
    assert_eq!(
        blocks,
        vec![
            FormattedBlock::Reasoning("driver stuck in traffic".into()),
            FormattedBlock::Resolution("ETA updated".into()),
        ]
    );
}

#[test]
fn tool_calls_are_listed_between_reasoning_and_resolution() {
    let mut formatter = ResponseFormatter::new(OutputFormat::Markers);
    let blocks = feed(
        &mut formatter,
        &[
            ModelChunk::text("Reasoning: need merchant load\nTool Calls:"),
            ModelChunk::tool_call(ToolCallChunk {
                index: 0,
                id: Some("call_1".into()),
                name: Some("get_merchant_status".into()),
                arguments: "{\"merchant_".into(),
            }),
            ModelChunk::tool_call(ToolCallChunk {
                index: 0,
                id: None,
                name: None,
                arguments: "id\":\"m-7\"}".into(),
            }),
            ModelChunk::finished(FinishReason::ToolCalls),
        ],
    );

    assert_eq!(blocks.len(), 2);
    assert_eq!(
        blocks[0],
        FormattedBlock::Reasoning("need merchant load".into())
    );
    match &blocks[1] {
        FormattedBlock::ToolCalls(calls) => {
            assert_eq!(calls.len(), 1);
            assert_eq!(calls[0].name, "get_merchant_status");
            assert_eq!(calls[0].arguments, json!({"merchant_id": "m-7"}));
        }
        other => panic!("expected tool calls, got {other:?}"),
    }

    let rendered = blocks[1].to_string();
    assert!(rendered.starts_with("\n=== TOOL CALLS ===\n"));
    assert!(rendered.contains("=== TOOL CALL: get_merchant_status ===\n{\n  \"merchant_id\": \"m-7\"\n}"));
}

#[test]
fn each_turn_starts_from_an_empty_buffer() {
    let mut formatter = ResponseFormatter::default();
    feed(
        &mut formatter,
        &[
            ModelChunk::text("Reasoning: first turn"),
            ModelChunk::finished(FinishReason::ToolCalls),
        ],
    );

    let blocks = feed(
        &mut formatter,
        &[
            ModelChunk::text("Reasoning: second turn Final Resolution: refund issued"),
            ModelChunk::finished(FinishReason::Stop),
        ],
    );
    assert_eq!(
        blocks,
        vec![
            FormattedBlock::Reasoning("second turn".into()),
            FormattedBlock::Resolution("refund issued".into()),
        ]
    );
}

#[test]
fn resolution_only_closing_turn_is_printed() {
    let mut formatter = ResponseFormatter::default();
    let first = feed(
        &mut formatter,
        &[
            ModelChunk::text("**Reasoning:** check merchant"),
            ModelChunk::tool_call(ToolCallChunk {
                index: 0,
                id: Some("call_1".into()),
                name: Some("get_merchant_status".into()),
                arguments: "{\"merchant_id\":\"m-7\"}".into(),
            }),
            ModelChunk::finished(FinishReason::ToolCalls),
        ],
    );
    assert_eq!(first[0], FormattedBlock::Reasoning("check merchant".into()));
    assert!(matches!(first[1], FormattedBlock::ToolCalls(_)));

    let last = feed(
        &mut formatter,
        &[
            ModelChunk::text("**Final Resolution:** Customer notified of 45-minute delay."),
            ModelChunk::finished(FinishReason::Stop),
        ],
    );
    assert_eq!(
        last,
        vec![FormattedBlock::Resolution(
            "Customer notified of 45-minute delay.".into()
        )]
    );
}

#[test]
fn resolution_without_any_reasoning_in_the_run_is_dropped() {
    let mut formatter = ResponseFormatter::default();
    let blocks = feed(
        &mut formatter,
        &[
            ModelChunk::text("Final Resolution: refund issued"),
            ModelChunk::finished(FinishReason::Stop),
        ],
    );
    assert!(blocks.is_empty());
}

#[test]
fn text_without_markers_prints_nothing() {
    let mut formatter = ResponseFormatter::default();
    let blocks = feed(
        &mut formatter,
        &[
            ModelChunk::text("I think the order is fine."),
            ModelChunk::finished(FinishReason::Stop),
        ],
    );
    assert!(blocks.is_empty());
}

#[test]
fn structured_mode_falls_back_to_markers() {
    let mut formatter = ResponseFormatter::new(OutputFormat::Structured);
    let blocks = feed(
        &mut formatter,
        &[
            ModelChunk::text("Reasoning: no json here Final Resolution: still fine"),
            ModelChunk::finished(FinishReason::Stop),
        ],
    );
    assert_eq!(
        blocks,
        vec![
            FormattedBlock::Reasoning("no json here".into()),
            FormattedBlock::Resolution("still fine".into()),
        ]
    );
}

#[test]
fn blocks_render_with_headers() {
    assert_eq!(
        FormattedBlock::Reasoning("late driver".into()).to_string(),
        "\n=== REASONING ===\nlate driver\n"
    );
    assert_eq!(
        FormattedBlock::Resolution("voucher sent".into()).to_string(),
        "\n=== FINAL RESOLUTION ===\nvoucher sent\n"
    );
}

#[test]
fn reasoning_without_resolution_is_kept() {
    let sections = split_sections("Reasoning: still investigating").expect("marker present");
    assert_eq!(sections.reasoning, "still investigating");
    assert!(sections.resolution.is_empty());
}
