//! Instruction text sent alongside each page.

/// Build the editing instruction for one page.
pub fn build_prompt(target_language: &str, series_hint: Option<&str>, feedback: Option<&str>) -> String {
    let context = match series_hint {
        Some(series) => format!(
            "Series: {series}. Use character pronouns and tone that fit this series."
        ),
        None => "Detect the context from visual cues (character age, relationships, setting, tone)."
            .to_string(),
    };

    let mut prompt = format!(
        "TASK: MANGA LOCALIZATION AND IMAGE EDITING\n\
         \n\
         1. Image quality\n\
         - Detect every speech bubble that contains source-language text.\n\
         - Produce an image identical to the original in line art, shading, contrast and resolution.\n\
         - Only modify pixels inside the speech bubbles. No filters, no compression, no style transfer.\n\
         \n\
         2. Translation into {target_language}\n\
         - Prefer natural spoken language over written language.\n\
         - Context: {context}\n\
         - Translate sound effects to {target_language} equivalents where possible.\n\
         \n\
         3. Text fitting\n\
         - Fit the translation inside the original bubbles, shortening it when needed.\n\
         - Use a typical manga lettering style (upper case for shouting).\n\
         \n\
         Return the final edited image."
    );

    if let Some(feedback) = feedback {
        prompt.push_str(
            "\n\nCORRECTIONS REQUESTED ON THE PREVIOUS RESULT (apply all of them):\n",
        );
        prompt.push_str(feedback);
    }

    prompt
}
