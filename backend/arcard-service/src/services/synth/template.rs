use super::SynthError;

const SCENE_TEMPLATE: &str = include_str!("../../../templates/scene.html");

/// Values substituted into the scene document
#[derive(Debug, Clone)]
pub struct SceneParams {
    pub session_id: String,
    pub marker_src: String,
    pub video_src: String,
    pub video_type: String,
    pub page_url: String,
}

pub fn render(params: &SceneParams) -> Result<String, SynthError> {
    let substitutions = [
        ("{{SESSION_ID}}", params.session_id.as_str()),
        ("{{MARKER_SRC}}", params.marker_src.as_str()),
        ("{{VIDEO_SRC}}", params.video_src.as_str()),
        ("{{VIDEO_TYPE}}", params.video_type.as_str()),
        ("{{PAGE_URL}}", params.page_url.as_str()),
    ];

    let mut html = SCENE_TEMPLATE.to_string();
    for (placeholder, value) in substitutions {
        if !html.contains(placeholder) {
            return Err(SynthError::Template(format!(
                "template has no {placeholder} placeholder"
            )));
        }
        html = html.replace(placeholder, &escape_attr(value));
    }

    if let Some(start) = html.find("{{") {
        let rest = &html[start..];
        let end = rest.find("}}").map(|i| i + 2).unwrap_or(rest.len().min(32));
        return Err(SynthError::Template(format!(
            "unresolved placeholder {}",
            &rest[..end]
        )));
    }

    Ok(html)
}

/// Escape for use inside a double-quoted HTML attribute
fn escape_attr(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            '{' => out.push_str("&#123;"),
            '}' => out.push_str("&#125;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params() -> SceneParams {
        SceneParams {
            session_id: "client1700000000000-0".into(),
            marker_src: "targets.mind".into(),
            video_src: "clip.mp4".into(),
            video_type: "video/mp4".into(),
            page_url: "https://cards.example/client1700000000000-0/index.html".into(),
        }
    }

    #[test]
    fn test_render_substitutes_asset_names() {
        let html = render(&params()).unwrap();
        assert!(html.contains("imageTargetSrc: targets.mind;"));
        assert!(html.contains(r#"<source src="clip.mp4" type="video/mp4">"#));
        assert!(html.contains(r#"data-session="client1700000000000-0""#));
        assert!(!html.contains("{{"));
    }

    #[test]
    fn test_scene_behaviour_present() {
        let html = render(&params()).unwrap();
        assert!(html.contains("mindar-image-target"));
        assert!(html.contains("a-video"));
        assert!(html.contains("loadedmetadata"));
        assert!(html.contains("targetFound"));
        assert!(html.contains("targetLost"));
        assert!(html.contains("startButton"));
        assert!(html.contains(r#"material="opacity: 0.65""#));
    }

    #[test]
    fn test_values_are_escaped() {
        let mut p = params();
        p.page_url = "https://x/\"><script>{{PAGE_URL}}".into();
        let html = render(&p).unwrap();
        assert!(html.contains("&quot;&gt;&lt;script&gt;&#123;&#123;PAGE_URL&#125;&#125;"));
        assert!(!html.contains("\"><script>"));
    }
}
