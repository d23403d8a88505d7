use facelink_core::DisplayState;

/// Lines shown to the user for the current state.
pub fn render(state: &DisplayState) -> Vec<String> {
    let mut lines = Vec::new();

    match (state.verified, &state.identity) {
        (Some(true), Some(identity)) => lines.push(format!("Verified. Welcome {identity}")),
        (Some(true), None) => lines.push("Verified.".to_string()),
        (Some(false), _) => lines.push("Not Verified".to_string()),
        (None, _) => {}
    }

    if let (Some(_), Some(confidence)) = (state.verified, state.confidence) {
        // Ties round away from zero, not to even.
        let shown = (confidence * 100.0).round() / 100.0;
        lines.push(format!("Match Accuracy: {shown:.2}%"));
    }

    if state.analyzed == Some(true) {
        lines.push(state.analysis.join(", "));
    }

    lines
}
