//! Session invalidity heuristic
//!
//! The backend has no structured error taxonomy, so a dead conversation is
//! recognised by keywords in the error text. The retry orchestrator takes the
//! classifier as a plain function so it can be replaced.

/// Decides from an error message whether the conversation should be recreated
pub type SessionInvalidClassifier = fn(&str) -> bool;

/// Lower-case keywords that mark a conversation as gone
const INVALID_SESSION_KEYWORDS: &[&str] = &[
    "conversation",
    "not found",
    "not exist",
    "deleted",
    "invalid",
    "不存在",
    "已删除",
    "无效",
    "找不到",
    "404",
];

/// Case-insensitive keyword match over the error text
pub fn is_session_invalid(message: &str) -> bool {
    let lower = message.to_lowercase();
    INVALID_SESSION_KEYWORDS
        .iter()
        .any(|keyword| lower.contains(keyword))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_english_keywords_match() {
        assert!(is_session_invalid("conversation not found"));
        assert!(is_session_invalid("Conversation Deleted"));
        assert!(is_session_invalid("resource does NOT EXIST"));
        assert!(is_session_invalid("Invalid conversation id"));
        assert!(is_session_invalid("Backend returned 404 Not Found"));
    }

    #[test]
    fn test_chinese_keywords_match() {
        assert!(is_session_invalid("对话不存在"));
        assert!(is_session_invalid("会话已删除"));
        assert!(is_session_invalid("会话无效"));
        assert!(is_session_invalid("找不到该对话"));
    }

    #[test]
    fn test_other_failures_do_not_match() {
        assert!(!is_session_invalid("Backend returned 500 Internal Server Error"));
        assert!(!is_session_invalid("Request timed out: operation timed out"));
        assert!(!is_session_invalid("connection refused"));
        assert!(!is_session_invalid(""));
    }
}
