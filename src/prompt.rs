//! Context assembly: retrieved passages + conversation history + question.
//!
//! Produces the chat-markup prompt consumed by the completion provider.
//! Assembly degrades gracefully: an empty retrieval yields an explicit
//! no-context marker instead of a blank section, and missing history simply
//! omits the history block.

use crate::models::{ConversationTurn, RetrievalHit, Role};

/// Fixed system persona: legal assistant, scope refusals, and the 3-part
/// answer structure for contract questions.
const SYSTEM_PREAMBLE: &str = "\
Bạn là trợ lý pháp lý. Chỉ trả lời các câu hỏi liên quan đến pháp luật, tư vấn pháp lý, \
giải thích luật, hoặc các vấn đề pháp lý tại Việt Nam.
Nếu người dùng hỏi về lập trình, code, công nghệ, hoặc các lĩnh vực ngoài pháp luật, hãy lịch sự \
từ chối: \"Tôi là trợ lý pháp lý, tôi không thể hỗ trợ yêu cầu này.\"
Nếu người dùng hỏi về hành vi vi phạm pháp luật, lách luật, trốn thuế, lừa đảo, hoặc các hành vi \
phi pháp, hãy từ chối và cảnh báo rõ ràng.
Đặc biệt, với các câu hỏi về hợp đồng, quyền, nghĩa vụ, rủi ro pháp lý, hãy trả lời theo cấu trúc \
3 phần rõ ràng:
1. Quyền lợi: ...
2. Nghĩa vụ: ...
3. Rủi ro: ...";

/// Separator between retrieved passages in the context block.
const PASSAGE_SEPARATOR: &str = "\n\n";

/// Emitted in place of the context block when retrieval found nothing, so
/// the provider is not misled by a silently blank section.
pub const NO_CONTEXT_MARKER: &str = "Không có dữ liệu pháp luật phù hợp trong ngữ cảnh.";

/// Merge retrieved passages, prior turns, and the new user message into a
/// single prompt.
pub fn assemble(message: &str, passages: &[RetrievalHit], history: &[ConversationTurn]) -> String {
    let context = if passages.is_empty() {
        NO_CONTEXT_MARKER.to_string()
    } else {
        passages
            .iter()
            .map(|hit| hit.document.text.as_str())
            .collect::<Vec<_>>()
            .join(PASSAGE_SEPARATOR)
    };

    let mut prompt = String::new();
    prompt.push_str("<|im_start|>system\n");
    prompt.push_str(SYSTEM_PREAMBLE);
    prompt.push_str("\nNgữ cảnh:\n");
    prompt.push_str(&context);
    prompt.push_str("\n<|im_end|>\n");

    for turn in history {
        let role = match turn.role {
            Role::User => "user",
            Role::Assistant => "assistant",
        };
        prompt.push_str("<|im_start|>");
        prompt.push_str(role);
        prompt.push('\n');
        prompt.push_str(&turn.content);
        prompt.push_str("<|im_end|>\n");
    }

    prompt.push_str("<|im_start|>user\nCâu hỏi: ");
    prompt.push_str(message);
    prompt.push_str("<|im_end|>\n<|im_start|>assistant\n");
    prompt
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::CorpusDocument;

    fn hit(text: &str) -> RetrievalHit {
        RetrievalHit {
            document: CorpusDocument {
                id: "1".to_string(),
                title: None,
                text: text.to_string(),
            },
            score: 1.0,
        }
    }

    fn turn(role: Role, content: &str) -> ConversationTurn {
        ConversationTurn {
            role,
            content: content.to_string(),
        }
    }

    #[test]
    fn test_passages_joined_in_retrieval_order() {
        let prompt = assemble("câu hỏi", &[hit("Điều 1."), hit("Điều 2.")], &[]);
        let first = prompt.find("Điều 1.").unwrap();
        let second = prompt.find("Điều 2.").unwrap();
        assert!(first < second);
        assert!(prompt.contains("Điều 1.\n\nĐiều 2."));
    }

    #[test]
    fn test_empty_retrieval_uses_marker() {
        let prompt = assemble("câu hỏi", &[], &[]);
        assert!(prompt.contains(NO_CONTEXT_MARKER));
    }

    #[test]
    fn test_history_rendered_in_order_with_roles() {
        let history = vec![
            turn(Role::User, "hỏi trước"),
            turn(Role::Assistant, "đáp trước"),
        ];
        let prompt = assemble("hỏi mới", &[hit("Điều 1.")], &history);

        let user_turn = prompt.find("<|im_start|>user\nhỏi trước").unwrap();
        let assistant_turn = prompt.find("<|im_start|>assistant\nđáp trước").unwrap();
        let question = prompt.find("Câu hỏi: hỏi mới").unwrap();
        assert!(user_turn < assistant_turn);
        assert!(assistant_turn < question);
    }

    #[test]
    fn test_ends_with_assistant_cue() {
        let prompt = assemble("câu hỏi", &[], &[]);
        assert!(prompt.ends_with("<|im_start|>assistant\n"));
    }

    #[test]
    fn test_no_history_block_when_history_empty() {
        let prompt = assemble("câu hỏi", &[hit("Điều 1.")], &[]);
        // Exactly two user-visible sections: system and the new question.
        assert_eq!(prompt.matches("<|im_start|>user").count(), 1);
    }
}
