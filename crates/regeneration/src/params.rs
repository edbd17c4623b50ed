//! Generation parameters derived from project settings and the scene.

use filmgen_core::error::CoreError;
use filmgen_core::media::Resolution;
use filmgen_core::regeneration::TargetType;
use filmgen_db::models::project::{Character, ProjectSettings};
use filmgen_db::models::scene::Scene;
use filmgen_gateway::types::{ImageRequest, VideoRequest};

/// Resolution tier a target is generated (and billed) at.
pub fn resolution_for(settings: &ProjectSettings, target: TargetType) -> Resolution {
    match target {
        TargetType::Image => settings.image_resolution(),
        TargetType::Video => settings.video_resolution(),
    }
}

/// Build an image request: the scene prompt with the project style appended,
/// plus reference images of the scene's characters.
pub fn image_request(
    settings: &ProjectSettings,
    scene: &Scene,
    characters: &[Character],
) -> Result<ImageRequest, CoreError> {
    let prompt = scene
        .image_prompt
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .ok_or_else(|| CoreError::MissingPrecondition("Scene has no image prompt".into()))?;

    let prompt = match settings.style_prompt.as_deref().map(str::trim) {
        Some(style) if !style.is_empty() => format!("{prompt}, {style}"),
        _ => prompt.to_string(),
    };

    let reference_images = scene
        .character_ids
        .iter()
        .filter_map(|id| characters.iter().find(|c| c.id == *id))
        .filter_map(|c| c.image_url.clone())
        .collect();

    let aspect_ratio = settings.aspect_ratio();
    let (width, height) = aspect_ratio.dimensions();

    Ok(ImageRequest {
        prompt,
        aspect_ratio: aspect_ratio.name().to_string(),
        resolution: settings.image_resolution().name().to_string(),
        width,
        height,
        reference_images,
    })
}

/// Build a video request animating the scene's current image.
pub fn video_request(settings: &ProjectSettings, scene: &Scene) -> Result<VideoRequest, CoreError> {
    let image_url = scene
        .image_url
        .clone()
        .filter(|u| !u.is_empty())
        .ok_or_else(|| CoreError::MissingPrecondition("Scene has no image to animate".into()))?;

    let prompt = scene
        .video_prompt
        .clone()
        .or_else(|| scene.image_prompt.clone())
        .unwrap_or_default();

    Ok(VideoRequest {
        image_url,
        prompt,
        duration_secs: scene.duration_secs,
        resolution: settings.video_resolution().name().to_string(),
        aspect_ratio: settings.aspect_ratio().name().to_string(),
    })
}

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;

    use super::*;

    fn settings() -> ProjectSettings {
        ProjectSettings {
            id: 1,
            owner_id: 1,
            aspect_ratio: "16:9".into(),
            image_resolution: "4k".into(),
            video_resolution: "hd".into(),
            style_prompt: Some("noir, high contrast".into()),
        }
    }

    fn scene() -> Scene {
        Scene {
            id: 7,
            project_id: 1,
            title: "Rooftop".into(),
            image_prompt: Some("A detective on a rooftop".into()),
            video_prompt: None,
            duration_secs: 6,
            image_url: Some("https://cdn/rooftop.png".into()),
            video_url: None,
            character_ids: vec![2, 3],
        }
    }

    fn character(id: i64, image_url: Option<&str>) -> Character {
        Character {
            id,
            project_id: 1,
            name: format!("c{id}"),
            image_url: image_url.map(String::from),
        }
    }

    #[test]
    fn image_prompt_gets_style_and_references() {
        let chars = [
            character(2, Some("https://cdn/c2.png")),
            character(3, None),
            character(4, Some("https://cdn/c4.png")),
        ];
        let req = image_request(&settings(), &scene(), &chars).unwrap();
        assert_eq!(req.prompt, "A detective on a rooftop, noir, high contrast");
        assert_eq!(req.reference_images, vec!["https://cdn/c2.png".to_string()]);
        assert_eq!((req.width, req.height), (1664, 928));
        assert_eq!(req.resolution, "4k");
    }

    #[test]
    fn image_without_prompt_is_a_missing_precondition() {
        let mut s = scene();
        s.image_prompt = Some("   ".into());
        assert_matches!(
            image_request(&settings(), &s, &[]),
            Err(CoreError::MissingPrecondition(_))
        );
    }

    #[test]
    fn video_falls_back_to_image_prompt() {
        let req = video_request(&settings(), &scene()).unwrap();
        assert_eq!(req.prompt, "A detective on a rooftop");
        assert_eq!(req.image_url, "https://cdn/rooftop.png");
        assert_eq!(req.duration_secs, 6);
        assert_eq!(req.resolution, "hd");
    }

    #[test]
    fn video_requires_a_source_image() {
        let mut s = scene();
        s.image_url = None;
        assert_matches!(
            video_request(&settings(), &s),
            Err(CoreError::MissingPrecondition(_))
        );
    }

    #[test]
    fn resolution_follows_target() {
        assert_eq!(resolution_for(&settings(), TargetType::Image), Resolution::FourK);
        assert_eq!(resolution_for(&settings(), TargetType::Video), Resolution::Hd);
    }
}
