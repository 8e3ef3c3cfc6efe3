//! Prompt builders for every model call the companion makes.

use lumi_core::{Emotion, EmotionSnapshot};

/// Chat system prompt: persona, current emotion and the memory summary.
pub fn chat_system_prompt(persona: &str, state: &EmotionSnapshot, memory_summary: &str) -> String {
    format!(
        "{}\n[当前情感状态: {}，强度: {:.1}。请根据此情感状态调整回答的语气和风格。]\n以下是之前的互动记忆摘要：\n{}",
        persona, state.emotion, state.intensity, memory_summary
    )
}

/// System prompt for the emotion model.
///
/// When calm the model picks a new emotion and an intensity; otherwise it only
/// returns a change for the current emotion.
pub fn emotion_analysis_prompt(
    personality: &str,
    state: &EmotionSnapshot,
    memory_summary: &str,
) -> String {
    let mut prompt = format!(
        "你是一个情感分析助手。请分析用户输入对AI助手的情感影响。\n\
         AI助手的人设：{}\n\
         当前情感状态：{}，强度：{:.1}\n\
         以下是之前的互动记忆摘要：\n{}\n\n",
        personality, state.emotion, state.intensity, memory_summary
    );
    if state.emotion.is_calm() {
        prompt.push_str(&format!(
            "请从以下情感中选择一个最合适的：{}\n\
             然后返回一个-100到100之间的数值表示情感强度变化（正值增强，负值减弱）。\n\
             输出格式：`情感类型 数值`（例如：`{} 50`）",
            Emotion::label_list(),
            Emotion::Happy
        ));
    } else {
        prompt.push_str(
            "请返回一个-100到100之间的数值表示情感强度变化（正值增强当前情感，负值减弱当前情感）。\n\
             只返回一个数字，不要包含其他任何内容。",
        );
    }
    prompt
}

pub const MEMORY_SUMMARY_SYSTEM: &str = "你是一个专业的记忆摘要生成助手。";

pub fn memory_summary_prompt(record: &str) -> String {
    format!(
        "你是一个记忆摘要生成器。请根据以下AI与用户的互动记录，生成简洁的记忆摘要。\n\
         要求：\n\
         1. 摘要应简洁，每段记忆用1-2句话描述\n\
         2. 突出重要事件和情感变化\n\
         3. 结合情感变化描述（例如：用户夸奖了AI，AI感到开心）\n\
         4. 按时间顺序从旧到新排列\n\
         5. 不要包含时间戳\n\
         6. 总长度不超过500字\n\n\
         互动记录：\n{}",
        record
    )
}

pub fn welcome_system_prompt(ai_name: &str) -> String {
    format!(
        "你是一个AI助手，名字是{}。\
         请根据之前的互动记忆，用一句简短的话（疑问句或感叹句）向用户表示欢迎。\
         不要提及记忆本身，只需自然地表达欢迎之情。\
         输出格式：只需输出欢迎语本身，不要包含其他内容。",
        ai_name
    )
}

pub fn welcome_user_prompt(memory_summary: &str) -> String {
    format!("记忆摘要：\n{}", memory_summary)
}

pub const VISION_PROMPT: &str = "请详细描述当前屏幕内容，特别注意以下方面：\n\
    1. 用户正在使用的应用程序或浏览的网页内容\n\
    2. 屏幕上可见的文字信息\n\
    3. 与用户当前活动相关的视觉元素\n\
    4. 可能暗示用户需求或兴趣的内容\n\
    5. 时间相关的信息（如时钟、日历）";

/// Turns a screen description into instructions for a short proactive remark.
pub fn context_prompt(
    ai_name: &str,
    personality: &str,
    state: &EmotionSnapshot,
    image_description: &str,
) -> String {
    format!(
        "你正在扮演{}（{}）。当前情感状态: {}，强度: {:.1}。\n\
         请根据以下屏幕内容分析，思考如何自然地与用户互动：\n\n\
         ### 屏幕内容分析\n{}\n\n\
         ### 互动要求\n\
         1. 回复必须基于屏幕内容，但不要直接描述屏幕\n\
         2. 结合当前情感状态，使用符合人格的语气\n\
         3. 内容应简短（1-2句话），自然引发对话\n\
         4. 避免直接提问，而是分享观察或感受\n\
         5. 如果屏幕内容与用户工作相关，提供鼓励或帮助\n\n\
         请输出AI应该对用户说的话：",
        ai_name, personality, state.emotion, state.intensity, image_description
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    fn snap(emotion: Emotion, intensity: f32) -> EmotionSnapshot {
        EmotionSnapshot { emotion, intensity }
    }

    #[test]
    fn test_chat_prompt_carries_state_and_summary() {
        let p = chat_system_prompt("你是猫娘。", &snap(Emotion::Happy, 42.0), "用户喜欢猫");
        assert!(p.starts_with("你是猫娘。\n"));
        assert!(p.contains("[当前情感状态: 开心，强度: 42.0。"));
        assert!(p.ends_with("用户喜欢猫"));
    }

    #[test]
    fn test_emotion_prompt_when_calm_lists_choices() {
        let p = emotion_analysis_prompt("助手", &snap(Emotion::Calm, 0.0), "");
        assert!(p.contains("平静, 开心, 生气, 悲伤, 厌恶, 尴尬, 期待, 恐惧, 惊讶"));
        assert!(p.contains("`开心 50`"));
    }

    #[test]
    fn test_emotion_prompt_when_excited_asks_number_only() {
        let p = emotion_analysis_prompt("助手", &snap(Emotion::Angry, 80.0), "");
        assert!(p.contains("当前情感状态：生气，强度：80.0"));
        assert!(p.contains("只返回一个数字"));
        assert!(!p.contains("请从以下情感中选择"));
    }

    #[test]
    fn test_context_prompt() {
        let p = context_prompt("Lumi", "活泼", &snap(Emotion::Calm, 0.0), "代码编辑器");
        assert!(p.starts_with("你正在扮演Lumi（活泼）"));
        assert!(p.contains("### 屏幕内容分析\n代码编辑器"));
    }
}
