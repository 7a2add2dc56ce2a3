//! Shared library snippets requested by node definitions
//!
//! Snippets are identified by name and deduplicated by identity: a helper used
//! by five nodes on the compiled path appears in the program exactly once.
//! Bodies may reference the preamble's ambient bindings (`globals`, `history`,
//! `history_sampler`) since snippets are always emitted after the preamble.

/// Centered world coordinate to `[0,1]` screen space.
///
/// Feedback reads happen in normalized, aspect-uncorrected screen space; each
/// feedback node performs this conversion at its own read site.
pub const WORLD_TO_SCREEN: &str = "world_to_screen";

/// Ring-buffer layer addressing and interpolated history sampling.
pub const HISTORY_READ: &str = "history_read";

/// HSV to RGB conversion.
pub const HSV_TO_RGB: &str = "hsv_to_rgb";

/// Cheap 2D hash for noise-driven nodes.
pub const HASH_2D: &str = "hash_2d";

/// Resolve a snippet identifier to its WGSL source.
pub fn snippet_source(id: &str) -> Option<&'static str> {
    match id {
        WORLD_TO_SCREEN => Some(
            "fn world_to_screen(p: vec2<f32>, res: vec2<f32>) -> vec2<f32> {\n\
             \x20   return (vec2<f32>(p.x, -p.y) * res.y + 0.5 * res) / res;\n\
             }\n",
        ),
        HISTORY_READ => Some(
            "fn history_layer(delay: u32) -> u32 {\n\
             \x20   let wrapped = max(delay % globals.depth, 1u);\n\
             \x20   return (globals.cursor + globals.depth - wrapped) % globals.depth;\n\
             }\n\
             \n\
             fn history_read(uv: vec2<f32>, delay: f32) -> vec4<f32> {\n\
             \x20   let d = max(delay, 1.0);\n\
             \x20   let near = u32(floor(d));\n\
             \x20   let a = textureSampleLevel(history, history_sampler, uv, i32(history_layer(near)), 0.0);\n\
             \x20   let b = textureSampleLevel(history, history_sampler, uv, i32(history_layer(near + 1u)), 0.0);\n\
             \x20   return mix(a, b, fract(d));\n\
             }\n",
        ),
        HSV_TO_RGB => Some(
            "fn hsv_to_rgb(hsv: vec3<f32>) -> vec3<f32> {\n\
             \x20   let k = (vec3<f32>(5.0, 3.0, 1.0) + hsv.x * 6.0) % 6.0;\n\
             \x20   let f = clamp(min(k, 4.0 - k), vec3<f32>(0.0), vec3<f32>(1.0));\n\
             \x20   return hsv.z - hsv.z * hsv.y * f;\n\
             }\n",
        ),
        HASH_2D => Some(
            "fn hash_2d(p: vec2<f32>) -> f32 {\n\
             \x20   let h = dot(p, vec2<f32>(127.1, 311.7));\n\
             \x20   return fract(sin(h) * 43758.5453123);\n\
             }\n",
        ),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_known_ids_resolve() {
        for id in [WORLD_TO_SCREEN, HISTORY_READ, HSV_TO_RGB, HASH_2D] {
            assert!(snippet_source(id).is_some(), "missing snippet '{}'", id);
        }
        assert!(snippet_source("made_up").is_none());
    }

    #[test]
    fn test_snippet_defines_its_identifier() {
        let src = snippet_source(WORLD_TO_SCREEN).unwrap();
        assert!(src.contains("fn world_to_screen("));
    }

    #[test]
    fn test_history_layer_clamps_wrapped_delay_off_the_write_slot() {
        // Mirrors RingCursor::read_slot: a delay that is an exact multiple of
        // the depth reads the previous frame, never the layer being written.
        let src = snippet_source(HISTORY_READ).unwrap();
        assert!(src.contains("max(delay % globals.depth, 1u)"));
    }
}
