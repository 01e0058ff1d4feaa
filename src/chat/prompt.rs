pub const CONTEXT_SEPARATOR: &str = "\n\n";

pub fn join_context(snippets: &[String]) -> String {
    snippets.join(CONTEXT_SEPARATOR)
}

pub fn build_prompt(emotion_label: &str, context: &str, message: &str) -> String {
    format!(
        "You are an empathetic assistant helping users manage their emotions.
User emotion (model detected): {emotion_label}
Relevant knowledge (from KB):
{context}

User said: {message}

Based on the emotion and the knowledge, reply in a gentle, concise, and safe way.
If the user shows severe distress, suggest contacting professional help."
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn prompt_embeds_emotion_context_and_message() {
        let context = join_context(&[
            "Breathe slowly.".to_string(),
            "Name five things you can see.".to_string(),
        ]);
        let prompt = build_prompt("negative", &context, "I can't calm down");

        assert!(prompt.starts_with(
            "You are an empathetic assistant helping users manage their emotions.\n"
        ));
        assert!(prompt.contains("User emotion (model detected): negative\n"));
        assert!(prompt.contains(
            "Relevant knowledge (from KB):\nBreathe slowly.\n\nName five things you can see.\n\n"
        ));
        assert!(prompt.contains("User said: I can't calm down\n"));
        assert!(prompt.ends_with("suggest contacting professional help."));
    }

    #[test]
    fn message_is_kept_verbatim() {
        let message = "  {weird} \"quotes\"\nand newlines  ";
        let prompt = build_prompt("neutral", "No context available.", message);
        assert!(prompt.contains(&format!("User said: {message}\n")));
    }
}
