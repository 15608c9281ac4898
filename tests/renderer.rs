use std::{fs, path::Path, time::SystemTime};

use symplate::{Args, DefaultFilter, Fault, Renderer, Settings};
use tempfile::TempDir;

/// Write a template source under the `views` directory.
fn write_source(root: &Path, file: &str, source: &str) {
    let path = root.join("views").join(file);
    fs::create_dir_all(path.parent().expect("file should have a parent"))
        .expect("directories should create");
    fs::write(path, source).expect("source should write");
}

/// Create a [`Renderer`] over the `views` directory.
fn renderer(root: &Path) -> Renderer {
    Renderer::new(Settings::new(root.join("views")))
}

#[test]
fn test_render_end_to_end() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "hello.symp", "{% template name %}hello, {{ name }}!");

    let mut renderer = renderer(root.path());
    let page = renderer
        .render("hello", &Args::new().with_must("name", "<taylor>"))
        .expect("template should render");

    assert_eq!(page, "hello, &lt;taylor&gt;!");
    assert!(root.path().join("symplouts/hello.json").is_file());
}

#[test]
fn test_nested_template_name() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "blog/index.symp", "{% template %}posts");

    let mut renderer = renderer(root.path());
    let page = renderer
        .render("blog/index", &Args::new())
        .expect("template should render");

    assert_eq!(page, "posts");
    assert!(root.path().join("symplouts/blog/index.json").is_file());
}

#[test]
fn test_cache_survives_source_change() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}one");

    let mut renderer = renderer(root.path());
    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "one");

    // Without timestamp checks the cached program keeps serving, and
    // even a reload sees the old artifact.
    write_source(root.path(), "page.symp", "{% template %}two");
    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "one");
    renderer.invalidate("page");
    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "one");

    renderer.compile("page", false).expect("template should compile");
    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "two");
}

#[test]
fn test_check_modified_recompiles() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}one");

    let mut renderer =
        Renderer::new(Settings::new(root.path().join("views")).with_check_modified(true));
    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "one");

    write_source(root.path(), "page.symp", "{% template %}two");
    let artifact = fs::File::options()
        .write(true)
        .open(root.path().join("symplouts/page.json"))
        .expect("artifact should open");
    artifact
        .set_modified(SystemTime::UNIX_EPOCH)
        .expect("artifact timestamp should update");

    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "two");
}

#[test]
fn test_corrupt_artifact_recompiles() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}fine");

    let mut renderer = renderer(root.path());
    renderer.compile("page", false).expect("template should compile");
    fs::write(root.path().join("symplouts/page.json"), "not a program")
        .expect("artifact should write");

    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "fine");
}

#[test]
fn test_auto_compile_disabled() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}fine");

    let mut renderer =
        Renderer::new(Settings::new(root.path().join("views")).with_auto_compile(false));
    let result = renderer.render("page", &Args::new());

    assert!(matches!(result, Err(Fault::Io(_))));
}

#[test]
fn test_compile_all() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "one.symp", "{% template %}1");
    write_source(root.path(), "two.symp", "{% template %}2");
    write_source(root.path(), "sub/three.symp", "{% template %}3");
    write_source(root.path(), "notes.txt", "not a template");

    let mut renderer = renderer(root.path());
    renderer
        .compile_all(false, false)
        .expect("templates should compile");

    let output = root.path().join("symplouts");
    assert!(output.join("one.json").is_file());
    assert!(output.join("two.json").is_file());
    assert!(!output.join("notes.json").is_file());
    assert!(!output.join("sub/three.json").is_file());

    renderer
        .compile_all(true, false)
        .expect("templates should compile");
    assert!(output.join("sub/three.json").is_file());
}

#[test]
fn test_preamble() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}{{ greeting }}");

    let settings =
        Settings::new(root.path().join("views")).with_preamble("greeting = 'hi'");
    let mut renderer = Renderer::new(settings);

    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "hi");
}

#[test]
fn test_custom_extension() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.tpl", "{% template %}custom");

    let settings = Settings::new(root.path().join("views")).with_extension(".tpl");
    let mut renderer = Renderer::new(settings);

    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "custom");
}

#[test]
fn test_default_filter_select() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "mail.txt.symp", "{% template %}{{ '<b>' }}");
    write_source(root.path(), "page.symp", "{% template %}{{ '<b>' }}");

    let select = DefaultFilter::Select(Box::new(|name: &str| {
        if name.ends_with(".txt") {
            "text".into()
        } else {
            "html".into()
        }
    }));
    let settings = Settings::new(root.path().join("views")).with_default_filter(select);
    let mut renderer = Renderer::new(settings);

    assert_eq!(renderer.render("mail.txt", &Args::new()).unwrap(), "<b>");
    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "&lt;b&gt;");
}

#[test]
fn test_custom_filter() {
    use symplate::filter::{serde::Value, to_text, HostError};

    fn upper(value: &Value) -> Result<String, HostError> {
        Ok(to_text(value).to_uppercase())
    }

    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}{{ 'quiet' }}");

    let select = DefaultFilter::Fixed("upper".into());
    let settings = Settings::new(root.path().join("views")).with_default_filter(select);
    let mut renderer = Renderer::new(settings)
        .with_filter("upper", upper as fn(&Value) -> Result<String, HostError>);

    assert_eq!(renderer.render("page", &Args::new()).unwrap(), "QUIET");
}

#[test]
fn test_compile_error_names_template() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "bad.symp", "{% template %}{{ oops");

    let mut renderer = renderer(root.path());
    let result = renderer.render("bad", &Args::new());

    match result {
        Err(Fault::Template(error)) => {
            assert_eq!(error.get_name(), Some("bad"));
            assert_eq!(error.line_num(), Some(1));
        }
        other => panic!("expected a template fault, found {other:?}"),
    }
}

#[test]
fn test_render_fault_is_host() {
    let root = TempDir::new().expect("temp dir should create");
    write_source(root.path(), "page.symp", "{% template %}{{ missing }}");

    let mut renderer = renderer(root.path());
    let result = renderer.render("page", &Args::new());

    match result {
        Err(Fault::Host(error)) => assert!(error.reason().contains("missing")),
        other => panic!("expected a host fault, found {other:?}"),
    }
}
