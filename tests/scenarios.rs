use runestone::content::{self, ContentRepository, Error, NewDocument};
use runestone::frontmatter::{self, Frontmatter, Parsed, Value};
use runestone::path;
use runestone::rewrite::TagRewriter;
use runestone::tag::{self, TagIndex};
use std::fs;
use std::path::Path;
use tempfile::TempDir;

type Result<T> = std::result::Result<T, Box<dyn std::error::Error>>;

fn tree(files: &[(&str, &str)]) -> Result<(TempDir, ContentRepository)> {
    let dir = TempDir::new()?;
    for (relative, contents) in files {
        let path = dir.path().join(relative);
        fs::create_dir_all(path.parent().unwrap_or_else(|| Path::new(".")))?;
        fs::write(path, contents)?;
    }
    let repository = ContentRepository::new(dir.path())?;
    Ok((dir, repository))
}

fn tagged(tags: &[&str]) -> String {
    let mut frontmatter = Frontmatter::new();
    frontmatter.insert("title", "Tagged");
    frontmatter.insert("tags", tags.to_vec());
    frontmatter::serialize(&frontmatter, "Body\n")
}

#[test]
fn create_then_get() -> Result<()> {
    let (_dir, repository) = tree(&[])?;
    repository.create(NewDocument {
        section: "users".to_owned(),
        slug: "hello-world".to_owned(),
        frontmatter: vec![("title", "Hello")].into_iter().collect(),
        body: "Body text".to_owned(),
        ..NewDocument::default()
    })?;

    let document = repository.get("users/hello-world.md")?;
    assert_eq!(document.frontmatter.str("title"), Some("Hello"));
    assert_eq!(document.frontmatter.get("draft"), Some(&Value::Bool(false)));
    assert_eq!(document.body, "Body text");
    Ok(())
}

#[test]
fn rename_across_two_files() -> Result<()> {
    let (_dir, repository) = tree(&[
        ("blog/one.md", tagged(&["payments", "api"]).as_str()),
        ("blog/two.md", tagged(&["payments"]).as_str()),
        ("blog/three.md", tagged(&["other"]).as_str()),
    ])?;

    let report = TagRewriter::new(repository.clone()).rename("payments", "billing")?;
    assert_eq!(report.count, 2);

    let index = TagIndex::build(&repository, tag::DEFAULT_FIELD)?;
    assert!(index.get("payments").is_none());
    assert_eq!(index.get("billing").map(|e| e.count), Some(2));
    Ok(())
}

#[test]
fn merge_is_lossless() -> Result<()> {
    let (_dir, repository) = tree(&[
        ("blog/a.md", tagged(&["Frontend"]).as_str()),
        ("blog/b.md", tagged(&["frontend", "ui"]).as_str()),
        ("blog/c.md", tagged(&["UI", "FRONTEND "]).as_str()),
        ("blog/d.md", tagged(&["ui"]).as_str()),
    ])?;
    let before = TagIndex::build(&repository, tag::DEFAULT_FIELD)?;
    let carriers: Vec<String> = before
        .get("frontend")
        .map(|e| e.articles.iter().map(|a| a.path.clone()).collect())
        .unwrap_or_default();
    assert_eq!(carriers.len(), 3);

    TagRewriter::new(repository.clone()).merge("frontend", "ui")?;

    for path in &carriers {
        let tags = repository.get(path)?.frontmatter.list("tags").map(<[String]>::to_vec);
        let tags = tags.unwrap_or_default();
        assert!(tags.iter().all(|t| tag::normalize(t) != "frontend"), "{}", path);
        assert_eq!(
            tags.iter().filter(|t| tag::normalize(t) == "ui").count(),
            1,
            "{}",
            path
        );
    }
    let after = TagIndex::build(&repository, tag::DEFAULT_FIELD)?;
    assert_eq!(after.count("frontend"), 0);
    assert_eq!(after.count("ui"), 4);
    Ok(())
}

#[test]
fn delete_drops_empty_lists() -> Result<()> {
    let (_dir, repository) = tree(&[
        ("blog/a.md", tagged(&["obsolete"]).as_str()),
        ("blog/b.md", tagged(&["Obsolete", "keep"]).as_str()),
    ])?;
    TagRewriter::new(repository.clone()).delete("obsolete")?;

    for summary in repository.list(&Default::default())? {
        let document = repository.get(&summary.relative_path)?;
        if let Some(tags) = document.frontmatter.get("tags") {
            assert!(!tags.is_empty(), "{} kept an empty list", summary.relative_path);
        }
    }
    assert!(!repository.get("blog/a.md")?.frontmatter.contains_key("tags"));
    Ok(())
}

#[test]
fn update_merge_semantics() -> Result<()> {
    let (_dir, repository) = tree(&[(
        "docs/page.md",
        "---\ntitle: \"Old\"\ndescription: \"X\"\n---\nBody\n",
    )])?;

    let document = repository.update(
        "docs/page.md",
        vec![("title", "New")].into_iter().collect(),
        None,
    )?;
    let expected: Frontmatter = vec![
        ("title", "New".to_owned()),
        ("description", "X".to_owned()),
        ("lastmod", content::today()),
    ]
    .into_iter()
    .collect();
    assert_eq!(document.frontmatter, expected);

    let document = repository.update(
        "docs/page.md",
        vec![("description", "")].into_iter().collect(),
        None,
    )?;
    assert!(!document.frontmatter.contains_key("description"));
    assert!(!fs::read_to_string(repository.root().join("docs/page.md"))?.contains("description"));
    Ok(())
}

#[test]
fn paths_stay_confined() -> Result<()> {
    let (_dir, repository) = tree(&[("blog/a.md", "---\ntitle: \"A\"\n---\n")])?;

    for input in ["/etc/passwd", "/blog/a.md"].iter() {
        match repository.resolver().resolve(input) {
            Err(path::Error::OutsideRoot(_)) => {}
            other => panic!("{} resolved to {:?}", input, other),
        }
    }

    let escapes = [
        "../outside.md",
        "blog/../../outside.md",
        "blog/./../../../etc/passwd",
        "..",
    ];
    for input in escapes.iter() {
        match repository.resolver().resolve(input) {
            Err(path::Error::OutsideRoot(_)) => {}
            other => panic!("{} resolved to {:?}", input, other),
        }
        assert!(matches!(repository.get(input), Err(Error::Path(_))));
        assert!(matches!(repository.delete(input), Err(Error::Path(_))));
        assert!(matches!(
            repository.update(input, Frontmatter::new(), None),
            Err(Error::Path(_))
        ));
    }
    assert!(repository.root().join("blog/a.md").is_file());

    let escaped_create = repository.create(NewDocument {
        section: "..".to_owned(),
        slug: "x".to_owned(),
        ..NewDocument::default()
    });
    assert!(matches!(escaped_create, Err(Error::Validation(_))));
    Ok(())
}

#[test]
fn tag_count_invariant() -> Result<()> {
    let (_dir, repository) = tree(&[
        ("a/one.md", tagged(&["Rust", " rust", "web"]).as_str()),
        ("a/two.md", tagged(&["RUST"]).as_str()),
        ("b/three.md", tagged(&["web", "Web"]).as_str()),
        ("b/_index.md", tagged(&["rust"]).as_str()),
        ("b/plain.md", "no frontmatter"),
    ])?;
    let index = TagIndex::build(&repository, tag::DEFAULT_FIELD)?;

    let mut lists = Vec::new();
    for entry in markdown_files(repository.root()) {
        let contents = fs::read_to_string(&entry)?;
        if let Parsed::Document { frontmatter, .. } = frontmatter::parse(&contents) {
            lists.push(frontmatter.list("tags").map(<[String]>::to_vec).unwrap_or_default());
        }
    }
    for entry in index.entries() {
        let key = tag::normalize(&entry.name);
        let expected = lists
            .iter()
            .filter(|tags| tags.iter().any(|t| tag::normalize(t) == key))
            .count();
        assert_eq!(entry.count, expected, "{}", entry.name);
    }
    assert_eq!(index.count("rust"), 3);
    assert_eq!(index.count("web"), 2);
    Ok(())
}

#[test]
fn round_trip_through_the_repository() -> Result<()> {
    let (_dir, repository) = tree(&[])?;
    let mut frontmatter = Frontmatter::new();
    frontmatter.insert("title", "Quotes \"and\" back\\slashes: yes");
    frontmatter.insert("description", "multi\nline");
    frontmatter.insert("weight", 10i64);
    frontmatter.insert("draft", true);
    frontmatter.insert("date", "2025-01-15");
    frontmatter.insert("version", "007");
    frontmatter.insert("tags", vec!["a, b", "- dash", "  padded  "]);
    frontmatter.insert("custom_field", "kept");

    let created = repository.create(NewDocument {
        section: "blog".to_owned(),
        slug: "round-trip".to_owned(),
        frontmatter: frontmatter.clone(),
        body: "---\nnot a fence\n".to_owned(),
        ..NewDocument::default()
    })?;
    for (key, value) in frontmatter.iter() {
        assert_eq!(created.frontmatter.get(key), Some(value), "{}", key);
    }
    assert_eq!(created.body, "---\nnot a fence\n");

    let raw = fs::read_to_string(repository.root().join("blog/round-trip.md"))?;
    let (parsed, body) = frontmatter::parse(&raw).into_parts();
    assert_eq!(frontmatter::serialize(&parsed, &body), raw);
    Ok(())
}

fn markdown_files(root: &Path) -> Vec<std::path::PathBuf> {
    runestone::tree::markdown_files(root, runestone::tree::Pages::All)
        .filter_map(|r| r.ok())
        .collect()
}
