//! Prompts sent to Gemini.
//!
//! All prompt text lives here so a wording change touches exactly one file
//! and tests can assert which prompt a request carried. The bot serves a
//! Japanese-speaking user, so instructions are written in Japanese; the
//! stop phrase is English because it must match byte-for-byte in both the
//! provider's stop-sequence list and the pagination loop.

/// Marker the model is asked to print once the translation is finished.
pub const TRANSLATION_STOP_PHRASE: &str = "This is end of translation.";

/// System instruction for the translation session.
pub const TRANSLATION_SYSTEM_PROMPT: &str = concat!(
    "あなたは翻訳を職業としています。正確で抜けがなく、誤りのない翻訳が必要とされています。",
    "また、語尾を均一にするなど、文章スタイルを均一にすることも重要な仕事です。",
    "与えられる文章はMarkdown形式で、$で囲まれる数式が含まれます。数式については変更する必要はありません。",
);

/// First-turn instruction sent together with the uploaded document.
pub const TRANSLATION_PROMPT: &str = concat!(
    "この論文を日本語に翻訳してください。",
    "翻訳が完了したら「This is end of translation.」と出力してください。",
    "参考文献は省略してください。",
);

/// Follow-up instruction for every turn after the first.
pub const CONTINUE_PROMPT: &str = "続きを出力してください。";

/// System instruction shared by both summarisation tasks.
pub const SUMMARY_SYSTEM_PROMPT: &str = concat!(
    "あなたは大学の教授で、研究室の学生に論文を解説しています。",
    "論文を解説する上で重要なのは、先行研究、仮説、実験、結論のような流れを意識した解説です。",
    "具体的な数値や手法を示すことでより理解される解説になります。",
    "スライド資料の場合、実験に対応するRQなど、関係性を示すとわかりやすくなります。",
);

/// Japanese explanatory summary (`ja_summary`).
pub const SUMMARY_JA_PROMPT: &str = concat!(
    "この論文を日本語でまとめて、解説してください。",
    "具体的な数値を含め、プレゼン資料20ページ程度の分量で解説したいです。",
);

/// English slide deck in Markdown (`en_slide`).
pub const SUMMARY_EN_SLIDE_PROMPT: &str = concat!(
    "この論文を英語でまとめて、20ページ程度の解説用のスライド資料をMarkdownで作成してください。",
    "箇条書きを用いるなど、スライド資料としてそのまま利用できる形式にしてください。",
);
