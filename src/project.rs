// ============================================================================
// 项目加载 - 文件发现, 编码识别, POM 解析, 源码归属
// ============================================================================
//
// All reads happen here, before planning. Files are read and decoded in
// parallel; the session is built once everything is in memory.

use crate::error::AutofixResult;
use crate::maven::{MavenSession, PomScanRecipe};
use crate::recipe::{Charset, JavaSource, SourceFile, XmlSource};
use crate::xml::XmlDocument;
use rayon::prelude::*;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

const SKIPPED_DIRS: &[&str] = &["target", "build", "node_modules", ".git", ".idea", ".mvn"];

pub struct Project {
    pub root: PathBuf,
    pub session: MavenSession,
    /// POMs first, then Java sources, each group in path order.
    pub sources: Vec<SourceFile>,
}

/// UTF-8 when valid, otherwise one char per byte.
pub fn decode(bytes: Vec<u8>) -> (String, Charset) {
    match String::from_utf8(bytes) {
        Ok(text) => (text, Charset::Utf8),
        Err(e) => (e.into_bytes().iter().map(|&b| b as char).collect(), Charset::Latin1),
    }
}

fn is_skipped(entry: &walkdir::DirEntry) -> bool {
    entry.depth() > 0
        && entry.file_type().is_dir()
        && entry
            .file_name()
            .to_str()
            .is_some_and(|name| SKIPPED_DIRS.contains(&name))
}

/// `pom.xml` files and `*.java` sources under `root`, sorted.
pub fn discover(root: &Path) -> (Vec<PathBuf>, Vec<PathBuf>) {
    let mut poms = Vec::new();
    let mut java = Vec::new();
    for entry in WalkDir::new(root)
        .into_iter()
        .filter_entry(|e| !is_skipped(e))
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().is_file())
    {
        let path = entry.into_path();
        if path.file_name().and_then(|n| n.to_str()) == Some("pom.xml") {
            poms.push(path);
        } else if path.extension().and_then(|e| e.to_str()) == Some("java") {
            java.push(path);
        }
    }
    poms.sort();
    java.sort();
    (poms, java)
}

fn read(path: &Path) -> AutofixResult<(String, Charset)> {
    Ok(decode(std::fs::read(path)?))
}

impl Project {
    pub fn load(root: &Path) -> AutofixResult<Project> {
        let (pom_paths, java_paths) = discover(root);
        info!("found {} POM files and {} Java sources", pom_paths.len(), java_paths.len());

        let poms: Vec<(PathBuf, Charset, XmlDocument)> = pom_paths
            .par_iter()
            .map(|path| -> AutofixResult<Option<(PathBuf, Charset, XmlDocument)>> {
                let (text, charset) = read(path)?;
                match XmlDocument::parse(path, &text) {
                    Ok(doc) => Ok(Some((path.clone(), charset, doc))),
                    Err(e) => {
                        warn!("{}, module skipped", e);
                        Ok(None)
                    }
                }
            })
            .collect::<AutofixResult<Vec<_>>>()?
            .into_iter()
            .flatten()
            .collect();

        let java: Vec<(PathBuf, Charset, String)> = java_paths
            .par_iter()
            .map(|path| read(path).map(|(text, charset)| (path.clone(), charset, text)))
            .collect::<AutofixResult<Vec<_>>>()?;

        let scanned = poms
            .iter()
            .map(|(path, _, doc)| (path.clone(), PomScanRecipe::scan(doc)))
            .collect();
        let mut session = MavenSession::new(scanned);
        session.assign_sources(java.iter().map(|(path, _, _)| path.as_path()));
        debug!("{} modules in session", session.modules().len());

        let mut sources = Vec::with_capacity(poms.len() + java.len());
        for (path, charset, document) in poms {
            sources.push(SourceFile::Xml(XmlSource {
                module: session.find_module_by_pom(&path).map(|m| m.id),
                path,
                charset,
                document,
            }));
        }
        for (path, charset, text) in java {
            sources.push(SourceFile::Java(JavaSource {
                module: session.owner_of(&path),
                path,
                charset,
                text,
            }));
        }

        Ok(Project {
            root: root.to_path_buf(),
            session,
            sources,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maven::ModuleId;
    use std::fs;

    const POM: &str = "<project>\n    <groupId>g</groupId>\n    <artifactId>a</artifactId>\n    <version>1</version>\n</project>\n";

    #[test]
    fn test_decode_falls_back_to_latin1() {
        assert_eq!(decode(b"plain".to_vec()), ("plain".to_string(), Charset::Utf8));
        let (text, charset) = decode(vec![b'c', b'a', b'f', 0xE9]);
        assert_eq!(charset, Charset::Latin1);
        assert_eq!(text, "caf\u{e9}");
    }

    #[test]
    fn test_load_skips_build_output() {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("src/main/java")).unwrap();
        fs::create_dir_all(root.join("target/classes")).unwrap();
        fs::write(root.join("pom.xml"), POM).unwrap();
        fs::write(root.join("src/main/java/A.java"), "class A {}").unwrap();
        fs::write(root.join("target/classes/B.java"), "class B {}").unwrap();
        fs::write(root.join("target/pom.xml"), POM).unwrap();

        let project = Project::load(root).unwrap();
        assert_eq!(project.session.modules().len(), 1);
        assert_eq!(project.sources.len(), 2);
        assert!(project.sources.iter().all(|s| s.module() == Some(ModuleId(0))));
        assert!(project.session.has_sources(ModuleId(0)));
    }

    #[test]
    fn test_broken_pom_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("pom.xml"), "<project><groupId>").unwrap();
        let project = Project::load(dir.path()).unwrap();
        assert!(project.session.modules().is_empty());
        assert!(project.sources.is_empty());
    }
}
