//! Prompts sent to the vision backend

/// Instruction attached to every still image
pub const ANALYSIS_PROMPT: &str = r#"Analyze this image and provide a structured description in JSON format with the following fields:
- description: A brief, descriptive summary (2-5 words) suitable for a filename
- scene_type: The type of scene (e.g., interview, b-roll, landscape, closeup)
- subjects: Main subjects or objects in the image, as an array of strings
- location: Location or setting if identifiable
- action: What's happening in the image
- mood: The overall mood or atmosphere
- technical: Technical aspects as an object of short strings (e.g., {"lighting": "backlit", "composition": "wide"})

Keep the description concise and filename-friendly. Return only valid JSON."#;
