use std::{
    collections::HashMap,
    fmt::{Display, Formatter, Result as FmtResult},
    fs,
    io,
    path::{Path, PathBuf},
    sync::Arc,
};

use crate::{
    compile::{Parser, Program},
    filter::{html, text, Filter, HostError},
    log::Error,
    render::Executor,
    store::Args,
    syntax::default_syntax,
};

use morel::Finder;
use serde_json::Value;

/// Describes anything that can go wrong while compiling or rendering a
/// named template.
#[derive(Debug)]
pub enum Fault {
    /// The template source is structurally invalid.
    Template(Error),
    /// Embedded template code faulted at render time.
    Host(HostError),
    /// A template source or compiled artifact could not be accessed.
    Io(io::Error),
}

impl Display for Fault {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            Fault::Template(error) if f.alternate() => write!(f, "{error:#}"),
            Fault::Template(error) => write!(f, "{error}"),
            Fault::Host(error) if f.alternate() => write!(f, "{error:#}"),
            Fault::Host(error) => write!(f, "{error}"),
            Fault::Io(error) => write!(f, "error: {error}"),
        }
    }
}

impl std::error::Error for Fault {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Fault::Io(error) => Some(error),
            _ => None,
        }
    }
}

impl From<Error> for Fault {
    fn from(error: Error) -> Self {
        Fault::Template(error)
    }
}

impl From<HostError> for Fault {
    fn from(error: HostError) -> Self {
        Fault::Host(error)
    }
}

impl From<io::Error> for Fault {
    fn from(error: io::Error) -> Self {
        Fault::Io(error)
    }
}

/// Chooses the output filter recorded into each compiled template.
pub enum DefaultFilter {
    /// Every template gets the same filter.
    Fixed(String),
    /// The filter is chosen per template, from the template name.
    Select(Box<dyn Fn(&str) -> String + Sync + Send>),
}

impl DefaultFilter {
    /// Return the filter name for the given template name.
    fn name_for(&self, name: &str) -> String {
        match self {
            DefaultFilter::Fixed(filter) => filter.clone(),
            DefaultFilter::Select(select) => select(name),
        }
    }
}

impl Default for DefaultFilter {
    fn default() -> Self {
        DefaultFilter::Fixed("html".into())
    }
}

/// Settings for a [`Renderer`].
///
/// # Examples
///
/// ```no_run
/// use symplate::{Renderer, Settings};
///
/// let settings = Settings::new("views")
///     .with_output_dir("views/compiled")
///     .with_check_modified(true);
/// let renderer = Renderer::new(settings);
/// ```
pub struct Settings {
    /// Directory holding template sources.
    template_dir: PathBuf,
    /// Directory holding compiled artifacts.
    output_dir: PathBuf,
    /// Extension on template sources, including the leading dot.
    extension: String,
    /// True to compare timestamps on every render.
    check_modified: bool,
    /// True to compile templates whose artifact is missing or unreadable.
    auto_compile: bool,
    /// Statements that run before anything else in every template.
    preamble: String,
    /// Chooses the output filter for each compiled template.
    default_filter: DefaultFilter,
}

impl Settings {
    /// Create new [`Settings`] for templates in the given directory.
    ///
    /// Compiled artifacts default to a `symplouts` directory beside the
    /// template directory, sources end in `.symp`, timestamps are not
    /// checked, missing artifacts compile on demand, and expressions run
    /// through the `html` filter.
    pub fn new<T>(template_dir: T) -> Self
    where
        T: Into<PathBuf>,
    {
        let template_dir = template_dir.into();
        let output_dir = match template_dir.parent() {
            Some(parent) => parent.join("symplouts"),
            None => PathBuf::from("symplouts"),
        };

        Self {
            template_dir,
            output_dir,
            extension: ".symp".into(),
            check_modified: false,
            auto_compile: true,
            preamble: String::new(),
            default_filter: DefaultFilter::default(),
        }
    }

    /// Set the directory that compiled artifacts are written to.
    pub fn with_output_dir<T>(mut self, path: T) -> Self
    where
        T: Into<PathBuf>,
    {
        self.output_dir = path.into();

        self
    }

    /// Set the extension on template sources, including the leading dot.
    ///
    /// An empty extension matches every file in the template directory.
    pub fn with_extension<T>(mut self, extension: T) -> Self
    where
        T: Into<String>,
    {
        self.extension = extension.into();

        self
    }

    /// Set whether timestamps are compared on every render, recompiling
    /// templates whose source is newer than their artifact.
    ///
    /// Enabling this also disables the in-process program cache, which is
    /// intended for development rather than production use.
    pub fn with_check_modified(mut self, enabled: bool) -> Self {
        self.check_modified = enabled;

        self
    }

    /// Set whether a missing or unreadable artifact causes the template
    /// to compile on demand.
    ///
    /// When disabled, rendering a template without a valid artifact
    /// returns [`Fault::Io`].
    pub fn with_auto_compile(mut self, enabled: bool) -> Self {
        self.auto_compile = enabled;

        self
    }

    /// Set the preamble, statements that run before anything else in
    /// every template.
    pub fn with_preamble<T>(mut self, text: T) -> Self
    where
        T: Into<String>,
    {
        self.preamble = text.into();

        self
    }

    /// Set how the output filter is chosen for each compiled template.
    pub fn with_default_filter(mut self, filter: DefaultFilter) -> Self {
        self.default_filter = filter;

        self
    }
}

/// Compiles and renders a directory of named templates.
///
/// Template names are paths relative to the template directory, without
/// the extension, so `blog/index` names `<template_dir>/blog/index.symp`.
/// Compiling writes a program artifact to the output directory, and
/// rendering executes that artifact against a set of [`Args`].
///
/// # Examples
///
/// ```no_run
/// use symplate::{Args, Renderer, Settings};
///
/// let mut renderer = Renderer::new(Settings::new("views"));
/// let html = renderer
///     .render("hello", &Args::new().with_must("name", "taylor"))
///     .expect("template should render");
/// ```
pub struct Renderer {
    /// Settings controlling compilation and caching.
    settings: Settings,
    /// Compiled searcher for the template syntax.
    finder: Finder,
    /// Filters available to expressions.
    filters: HashMap<String, Box<dyn Filter>>,
    /// Programs already loaded this process.
    cache: HashMap<String, Arc<Program>>,
}

impl Renderer {
    /// Create a new [`Renderer`] with the given [`Settings`].
    ///
    /// The `html` and `text` filters are always registered.
    pub fn new(settings: Settings) -> Self {
        let mut filters: HashMap<String, Box<dyn Filter>> = HashMap::new();
        filters.insert(
            "html".into(),
            Box::new(html as fn(&Value) -> Result<String, HostError>),
        );
        filters.insert(
            "text".into(),
            Box::new(text as fn(&Value) -> Result<String, HostError>),
        );

        Self {
            settings,
            finder: Finder::new(default_syntax()),
            filters,
            cache: HashMap::new(),
        }
    }

    /// Register a [`Filter`] under the given name.
    ///
    /// Registering over the name of an existing filter, including the
    /// built in `html` and `text` filters, replaces it.
    pub fn add_filter<N, F>(&mut self, name: N, filter: F)
    where
        N: Into<String>,
        F: Filter + 'static,
    {
        self.filters.insert(name.into(), Box::new(filter));
    }

    /// Register a [`Filter`] under the given name.
    ///
    /// Returns the `Renderer`, so additional methods may be chained.
    pub fn with_filter<N, F>(mut self, name: N, filter: F) -> Self
    where
        N: Into<String>,
        F: Filter + 'static,
    {
        self.add_filter(name, filter);

        self
    }

    /// Return the path of the given template's source.
    pub fn source_path(&self, name: &str) -> PathBuf {
        self.settings
            .template_dir
            .join(format!("{name}{}", self.settings.extension))
    }

    /// Return the path of the given template's compiled artifact.
    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.settings.output_dir.join(format!("{name}.json"))
    }

    /// Compile the named template and write its artifact.
    ///
    /// Any cached program for the name is dropped, so the next render
    /// picks up the fresh artifact. When `verbose` is true the source
    /// and artifact paths are printed.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the source cannot be read, is
    /// structurally invalid, or the artifact cannot be written.
    pub fn compile(&mut self, name: &str, verbose: bool) -> Result<(), Fault> {
        if verbose {
            println!(
                "compiling {} -> {}",
                self.source_path(name).display(),
                self.artifact_path(name).display()
            );
        }
        self.build(name)?;

        Ok(())
    }

    /// Drop the cached program for the named template, if any.
    ///
    /// The next render reloads the template from its artifact.
    pub fn invalidate(&mut self, name: &str) {
        self.cache.remove(name);
    }

    /// Compile every template in the template directory.
    ///
    /// When `recursive` is true subdirectories are included, and when
    /// `verbose` is true each template's source and artifact paths are
    /// printed as it compiles.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] on the first template that fails to compile.
    pub fn compile_all(&mut self, recursive: bool, verbose: bool) -> Result<(), Fault> {
        let template_dir = self.settings.template_dir.clone();
        let extension = self.settings.extension.clone();
        let mut names = Vec::new();
        collect(&template_dir, "", &extension, recursive, &mut names)?;
        names.sort();

        for name in names {
            self.compile(&name, verbose)?;
        }

        Ok(())
    }

    /// Render the named template with the given [`Args`].
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the template cannot be loaded, or when
    /// embedded template code faults.
    pub fn render(&mut self, name: &str, args: &Args) -> Result<String, Fault> {
        let program = self.load(name)?;
        let output = Executor::new(&program, &self.filters).execute(args)?;

        Ok(output)
    }

    /// Compile the named template, write its artifact, and return the
    /// program.
    fn build(&mut self, name: &str) -> Result<Program, Fault> {
        let source = fs::read_to_string(self.source_path(name))?;
        let program = Parser::new(&source, &self.finder)
            .with_filter(self.settings.default_filter.name_for(name))
            .with_preamble(self.settings.preamble.clone())
            .compile()
            .map_err(|error| error.with_name(name))?;

        let path = self.artifact_path(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let encoded = serde_json::to_vec(&program)
            .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))?;

        // Stage beside the artifact so a concurrent reader never sees a
        // partial write.
        let staging = path.with_extension("json.tmp");
        fs::write(&staging, encoded)?;
        fs::rename(&staging, &path)?;

        self.cache.remove(name);

        Ok(program)
    }

    /// Load the named template's program, compiling first when needed.
    fn load(&mut self, name: &str) -> Result<Arc<Program>, Fault> {
        if !self.settings.check_modified {
            if let Some(program) = self.cache.get(name) {
                return Ok(Arc::clone(program));
            }
        }

        if self.settings.check_modified && self.stale(name)? {
            let program = self.build(name)?;

            return Ok(self.store(name, program));
        }

        match read_artifact(&self.artifact_path(name)) {
            Ok(program) => Ok(self.store(name, program)),
            Err(_) if self.settings.auto_compile => {
                let program = self.build(name)?;

                Ok(self.store(name, program))
            }
            Err(error) => Err(Fault::Io(error)),
        }
    }

    /// True if the named template's artifact is missing or older than
    /// its source.
    ///
    /// # Errors
    ///
    /// Returns [`Fault::Io`] when the source itself cannot be read.
    fn stale(&self, name: &str) -> Result<bool, Fault> {
        let source = fs::metadata(self.source_path(name))?.modified()?;
        let artifact = match fs::metadata(self.artifact_path(name)).and_then(|m| m.modified()) {
            Ok(artifact) => artifact,
            Err(_) => return Ok(true),
        };

        Ok(artifact < source)
    }

    /// Cache the program under the given name and return it.
    ///
    /// Nothing is cached while timestamps are being checked, every
    /// render must see a fresh artifact.
    fn store(&mut self, name: &str, program: Program) -> Arc<Program> {
        let program = Arc::new(program);
        if !self.settings.check_modified {
            self.cache.insert(name.into(), Arc::clone(&program));
        }

        program
    }
}

/// Read a compiled [`Program`] artifact from the given path.
fn read_artifact(path: &Path) -> io::Result<Program> {
    let encoded = fs::read(path)?;

    serde_json::from_slice(&encoded)
        .map_err(|error| io::Error::new(io::ErrorKind::InvalidData, error))
}

/// Collect the template names under the given directory.
fn collect(
    dir: &Path,
    prefix: &str,
    extension: &str,
    recursive: bool,
    names: &mut Vec<String>,
) -> Result<(), Fault> {
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let file_name = entry.file_name();
        let file_name = file_name.to_string_lossy();

        if entry.file_type()?.is_dir() {
            if recursive {
                let prefix = format!("{prefix}{file_name}/");
                collect(&entry.path(), &prefix, extension, recursive, names)?;
            }
            continue;
        }
        if let Some(stem) = file_name.strip_suffix(extension) {
            names.push(format!("{prefix}{stem}"));
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::{DefaultFilter, Renderer, Settings};
    use std::path::PathBuf;

    #[test]
    fn test_paths() {
        let renderer = Renderer::new(Settings::new("views").with_output_dir("out"));

        assert_eq!(
            renderer.source_path("blog/index"),
            PathBuf::from("views/blog/index.symp")
        );
        assert_eq!(
            renderer.artifact_path("blog/index"),
            PathBuf::from("out/blog/index.json")
        );
    }

    #[test]
    fn test_default_output_dir() {
        let renderer = Renderer::new(Settings::new("site/views"));

        assert_eq!(
            renderer.artifact_path("index"),
            PathBuf::from("site/symplouts/index.json")
        );
    }

    #[test]
    fn test_custom_extension() {
        let settings = Settings::new("views").with_extension(".tmpl");
        let renderer = Renderer::new(settings);

        assert_eq!(renderer.source_path("page"), PathBuf::from("views/page.tmpl"));
    }

    #[test]
    fn test_default_filter_select() {
        let select = DefaultFilter::Select(Box::new(|name: &str| {
            if name.ends_with(".txt") {
                "text".into()
            } else {
                "html".into()
            }
        }));

        assert_eq!(select.name_for("email.txt"), "text");
        assert_eq!(select.name_for("page"), "html");
    }
}
