use indoc::formatdoc;

use super::chat::{ChatMessage, ConversationState};

/// Splits `text` into ceil(len/split_length) contiguous chunks, each
/// wrapped in continuation framing so a conversational model treats the
/// sequence as one logical document. A zero split length is an explicit
/// no-op, not an error.
pub fn split_prompt(text: &str, split_length: usize) -> Vec<String> {
    if split_length == 0 {
        return Vec::new();
    }

    let chars: Vec<char> = text.chars().collect();
    let num_parts = chars.len().div_ceil(split_length);
    let mut framed = Vec::with_capacity(num_parts);

    for (i, chunk) in chars.chunks(split_length).enumerate() {
        let part = i + 1;
        let payload: String = chunk.iter().collect();

        let content = if part == num_parts {
            formatdoc! {r#"
                [START PART {part}/{num_parts}]
                {payload}
                [END PART {part}/{num_parts}]
                ALL PARTS SENT. I will now send a list of categories and you will return the result for them immediately. For now just acknowledge you understood."#}
        } else {
            formatdoc! {r#"
                Do not answer yet. This is just another part of the text I want to send you. Just receive and acknowledge as "Part {part}/{num_parts} received" and wait for the next part.
                [START PART {part}/{num_parts}]
                {payload}
                [END PART {part}/{num_parts}]
                Remember not answering yet. Just acknowledge you received this part with the message "Part {part}/{num_parts} received" and wait for the next part."#}
        };

        framed.push(content);
    }

    framed
}

/// Builds the primed conversation: system prompt, then every framed chunk
/// paired with the acknowledgement the model is expected to give, so each
/// batch question starts from a fully primed context.
pub fn prime_conversation(
    system_prompt: &str,
    serialized: &str,
    chunk_threshold: usize,
) -> ConversationState {
    let mut conversation = ConversationState::new(system_prompt);
    let chunks = split_prompt(serialized, chunk_threshold);
    let total = chunks.len();

    for (i, chunk) in chunks.into_iter().enumerate() {
        let ack = if i + 1 == total {
            "I have received all parts of the text. You can now start sending shop categories, and I will provide you with the related results.".to_string()
        } else {
            format!(
                "Part {}/{} received. Please proceed with the next part.",
                i + 1,
                total
            )
        };
        conversation.push(ChatMessage::user(chunk));
        conversation.push(ChatMessage::assistant(ack));
    }

    conversation
}
