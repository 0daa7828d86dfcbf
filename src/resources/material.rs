//! Material library parser.
//!
//! Reads `.mtl`-style text line by line. Every recognized directive fills one
//! field of the material opened by the last `newmtl`; later directives for the
//! same slot replace earlier ones. Texture maps are decoded right away, relative
//! to the directory of the material file.

use std::{
    fs::File,
    io::{BufRead, BufReader},
    path::{Path, PathBuf},
    str::SplitWhitespace,
};

use crate::{
    data_structures::{
        material::{Material, MaterialTable, TextureSlot},
        texture::TexelBuffer,
    },
    error::{Error, Result},
    resources::texture::load_image,
};

pub fn load_materials(path: impl AsRef<Path>) -> Result<MaterialTable> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| Error::file_open(path, e))?;
    let materials = parse_materials(BufReader::new(file), path)?;
    log::debug!("loaded {} material(s) from {}", materials.len(), path.display());
    Ok(materials)
}

/// Parses a material library. `origin` names the source in errors and is the
/// base for relative texture map paths.
pub fn parse_materials<R: BufRead>(reader: R, origin: &Path) -> Result<MaterialTable> {
    let base = origin.parent().map(Path::to_path_buf).unwrap_or_default();
    let mut materials = MaterialTable::new();
    let mut current: Option<(String, Material)> = None;

    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|e| Error::file_open(origin, e))?;
        let mut tokens = Tokens {
            inner: line.split_whitespace(),
            origin,
            line: idx + 1,
        };
        let Some(directive) = tokens.inner.next() else {
            continue;
        };

        if directive == "newmtl" {
            let name = tokens.word("no name found in newmtl")?;
            if let Some((name, material)) = current.take() {
                materials.insert(name, material);
            }
            current = Some((name.to_string(), Material::new()));
            continue;
        }

        let Some(kind) = Directive::parse(directive) else {
            continue;
        };
        let Some((name, material)) = current.as_mut() else {
            log::warn!(
                "{}:{}: {} before any newmtl, skipped",
                origin.display(),
                tokens.line,
                directive
            );
            continue;
        };

        match kind {
            Directive::Map(slot) => {
                let file = tokens.word(&format!("no path found in {}", directive))?;
                let path = resolve(&base, file);
                material.set_texture(slot, load_image(&path)?);
            }
            Directive::Colour(slot) => {
                let r = tokens.float(directive)?;
                let g = tokens.float(directive)?;
                let b = tokens.float(directive)?;
                material.set_texture(slot, TexelBuffer::rgb(r, g, b));
            }
            Directive::Scalar(slot) => {
                let value = tokens.float(directive)?;
                material.set_texture(slot, TexelBuffer::scalar(value));
            }
            Directive::Alpha => {
                let alpha = tokens.float(directive)?;
                if !(0.0..=1.0).contains(&alpha) {
                    log::warn!(
                        "{}:{}: d {} of material {} clamped to [0, 1]",
                        origin.display(),
                        tokens.line,
                        alpha,
                        name
                    );
                }
                material.set_alpha(alpha.clamp(0.0, 1.0));
            }
            Directive::Illum => {
                let illum = tokens.float(directive)?;
                if illum < 0.0 {
                    return Err(Error::parse(origin, tokens.line, "illum must not be negative"));
                }
                material.set_illum(illum);
            }
        }
    }

    if let Some((name, material)) = current {
        materials.insert(name, material);
    }
    Ok(materials)
}

enum Directive {
    Map(TextureSlot),
    Colour(TextureSlot),
    Scalar(TextureSlot),
    Alpha,
    Illum,
}

impl Directive {
    fn parse(token: &str) -> Option<Self> {
        Some(match token {
            "map_Ka" => Directive::Map(TextureSlot::Ambient),
            "map_Kd" => Directive::Map(TextureSlot::Diffuse),
            "map_norm" => Directive::Map(TextureSlot::Normal),
            "map_Pm" => Directive::Map(TextureSlot::Metallic),
            "map_Pr" => Directive::Map(TextureSlot::Roughness),
            "Ka" => Directive::Colour(TextureSlot::Ambient),
            "Kd" => Directive::Colour(TextureSlot::Diffuse),
            "norm" => Directive::Colour(TextureSlot::Normal),
            "Pm" => Directive::Scalar(TextureSlot::Metallic),
            "Pr" => Directive::Scalar(TextureSlot::Roughness),
            "d" => Directive::Alpha,
            "illum" => Directive::Illum,
            _ => return None,
        })
    }
}

struct Tokens<'a> {
    inner: SplitWhitespace<'a>,
    origin: &'a Path,
    line: usize,
}

impl<'a> Tokens<'a> {
    fn word(&mut self, missing: &str) -> Result<&'a str> {
        self.inner
            .next()
            .ok_or_else(|| Error::parse(self.origin, self.line, missing))
    }

    fn float(&mut self, directive: &str) -> Result<f32> {
        let token = self.word(&format!("no value found in {}", directive))?;
        token.parse().map_err(|_| {
            Error::parse(
                self.origin,
                self.line,
                format!("invalid value '{}' in {}", token, directive),
            )
        })
    }
}

fn resolve(base: &Path, file: &str) -> PathBuf {
    let path = Path::new(file);
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    }
}

#[cfg(test)]
mod tests {
    use std::{io::Cursor, rc::Rc};

    use super::*;
    use crate::data_structures::texture::Channels;

    fn parse(text: &str) -> Result<MaterialTable> {
        parse_materials(Cursor::new(text), Path::new("test.mtl"))
    }

    #[test]
    fn every_newmtl_block_becomes_an_entry() {
        let materials = parse("newmtl red\nKd 1 0 0\n\nnewmtl green\nKd 0 1 0\nnewmtl blue\n").unwrap();
        let names: Vec<_> = materials.keys().map(String::as_str).collect();
        assert_eq!(names, vec!["blue", "green", "red"]);
        assert!(!materials.contains_key(""));
    }

    #[test]
    fn colour_becomes_single_texel() {
        let materials = parse("newmtl red\nKd 1 0 0\n").unwrap();
        let diffuse = materials["red"].texture(TextureSlot::Diffuse).unwrap();
        assert_eq!(diffuse.dimensions(), (1, 1));
        assert_eq!(diffuse.texels(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn scalars_alpha_and_illum() {
        let materials = parse("newmtl metal\nPm 0.9\nPr 0.2\nd 0.5\nillum 2\nnorm 0.5 0.5 1\n").unwrap();
        let metal = &materials["metal"];
        assert_eq!(metal.texture(TextureSlot::Metallic).unwrap().texels(), &[0.9]);
        assert_eq!(metal.texture(TextureSlot::Roughness).unwrap().texels(), &[0.2]);
        assert_eq!(metal.texture(TextureSlot::Normal).unwrap().texels(), &[0.5, 0.5, 1.0]);
        assert_eq!(metal.alpha(), 0.5);
        assert_eq!(metal.illum(), 2.0);
        assert!(metal.texture(TextureSlot::Ambient).is_none());
    }

    #[test]
    fn last_directive_for_a_slot_wins() {
        let materials = parse("newmtl m\nKd 1 0 0\nKd 0 0 1\n").unwrap();
        let diffuse: &Rc<TexelBuffer> = materials["m"].texture(TextureSlot::Diffuse).unwrap();
        assert_eq!(diffuse.texels(), &[0.0, 0.0, 1.0]);
    }

    fn library_with_image(text: &str) -> (tempfile::TempDir, MaterialTable) {
        let dir = tempfile::tempdir().unwrap();
        image::RgbaImage::from_pixel(2, 3, image::Rgba([0, 255, 0, 255]))
            .save(dir.path().join("green.png"))
            .unwrap();
        let path = dir.path().join("m.mtl");
        std::fs::write(&path, text).unwrap();
        let materials = load_materials(&path).unwrap();
        (dir, materials)
    }

    #[test]
    fn colour_after_map_replaces_the_image() {
        let (_dir, materials) = library_with_image("newmtl m\nmap_Kd green.png\nKd 1 0 0\n");
        let diffuse = materials["m"].texture(TextureSlot::Diffuse).unwrap();
        assert_eq!(diffuse.dimensions(), (1, 1));
        assert_eq!(diffuse.channels(), Channels::Rgb);
        assert_eq!(diffuse.texels(), &[1.0, 0.0, 0.0]);
    }

    #[test]
    fn map_after_colour_replaces_the_constant() {
        let (_dir, materials) = library_with_image("newmtl m\nKd 1 0 0\nmap_Kd green.png\n");
        let diffuse = materials["m"].texture(TextureSlot::Diffuse).unwrap();
        assert_eq!(diffuse.dimensions(), (2, 3));
        assert_eq!(diffuse.channels(), Channels::Rgba);
        assert_eq!(&diffuse.texels()[..4], &[0.0, 1.0, 0.0, 1.0]);
    }

    #[test]
    fn missing_tokens_report_line() {
        match parse("newmtl m\n\nKd 1 0\n") {
            Err(Error::Parse { line, message, .. }) => {
                assert_eq!(line, 3);
                assert_eq!(message, "no value found in Kd");
            }
            other => panic!("expected parse error, got {:?}", other),
        }
        assert!(matches!(parse("newmtl\n"), Err(Error::Parse { line: 1, .. })));
        assert!(matches!(parse("newmtl m\nmap_Kd\n"), Err(Error::Parse { line: 2, .. })));
        assert!(matches!(parse("newmtl m\nd\n"), Err(Error::Parse { line: 2, .. })));
        assert!(matches!(parse("newmtl m\nPr high\n"), Err(Error::Parse { line: 2, .. })));
    }

    #[test]
    fn file_without_newmtl_is_empty() {
        let materials = parse("# nothing here\nKd 1 1 1\nillum 2\n").unwrap();
        assert!(materials.is_empty());
    }

    #[test]
    fn alpha_is_clamped_and_negative_illum_rejected() {
        let materials = parse("newmtl glass\nd 1.5\n").unwrap();
        assert_eq!(materials["glass"].alpha(), 1.0);
        assert!(matches!(parse("newmtl glass\nillum -1\n"), Err(Error::Parse { .. })));
    }

    #[test]
    fn unknown_directives_are_ignored() {
        let materials = parse("newmtl m\nNs 10\nKs 1 1 1\nKd 0.5 0.5 0.5\n").unwrap();
        assert_eq!(materials["m"].textures().count(), 1);
    }

    #[test]
    fn texture_maps_resolve_next_to_the_library() {
        let dir = tempfile::tempdir().unwrap();
        image::RgbImage::from_pixel(1, 1, image::Rgb([0, 255, 0]))
            .save(dir.path().join("green.png"))
            .unwrap();
        let mtl = dir.path().join("lib.mtl");
        std::fs::write(&mtl, "newmtl grass\nmap_Kd green.png\n").unwrap();

        let materials = load_materials(&mtl).unwrap();
        let diffuse = materials["grass"].texture(TextureSlot::Diffuse).unwrap();
        assert_eq!(diffuse.texels(), &[0.0, 1.0, 0.0, 1.0]);

        std::fs::write(&mtl, "newmtl grass\nmap_Kd missing.png\n").unwrap();
        assert!(matches!(load_materials(&mtl), Err(Error::FileOpen { .. })));
        assert!(matches!(
            load_materials(dir.path().join("absent.mtl")),
            Err(Error::FileOpen { .. })
        ));
    }
}
