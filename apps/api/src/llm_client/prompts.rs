// Shared prompt fragments. Each caller that needs the LLM keeps its own
// prompts.rs next to it; this file holds the cross-cutting pieces.

/// System prompt fragment that asks for bare JSON output.
pub const JSON_ONLY_SYSTEM: &str = "You MUST respond with valid JSON only. \
    Do NOT include any text outside the JSON object. \
    Do NOT use markdown code fences.";
