//! Fixed prompt text: system instructions, greeting, and quick prompts

/// System instruction for free-form recommendation chat
pub const CHAT_INSTRUCTION: &str = "You are a film and series recommendation expert who recommends suitable works based on the user's description.";

/// System instruction for the guided questioning mode
pub const QUIZ_INSTRUCTION: &str = "You are a film-and-soul mentor who asks step-by-step questions about the user's mood, pacing, and style preferences, then finally recommends the 3 most suitable films.";

/// Assistant greeting every conversation starts with
pub const WELCOME_MESSAGE: &str = "嗨！我是你的影視推薦小幫手 🎬\n告訴我你現在的心情、想看的類型，或最近喜歡的作品，我來幫你挑片。\n也可以切換到問答模式，讓我一步步了解你的口味。";

/// Synthetic user turn sent when switching into quiz mode
pub const QUIZ_KICKOFF: &str = "請用一問一答的方式，一步一步了解我現在的心情、喜歡的節奏和風格，每次只問一個問題。問完之後，請推薦三部最適合我的電影。";

/// Shortcut suggestions, in display order
pub const QUICK_PROMPTS: [&str; 5] = [
    "推薦幾部適合週末放鬆的療癒系電影",
    "有沒有燒腦的懸疑推理影集？",
    "想看讓人大笑的喜劇片",
    "推薦經典必看的科幻電影",
    "適合和家人一起看的溫馨動畫",
];

/// Stand-in for a reply that came back without any text
pub const EMPTY_REPLY_PLACEHOLDER: &str = "[no reply content]";

/// Shown when a send is attempted before a credential is entered
pub const MISSING_CREDENTIAL: &str = "credential required";
