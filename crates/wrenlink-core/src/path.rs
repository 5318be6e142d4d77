//! Module name to module path.

/// Build the path a module is looked up under: the name with the source
/// extension appended.
///
/// Pure and total. An empty name yields the bare extension; no other name is
/// treated specially either.
pub fn module_path(name: &str, extension: &str) -> String {
    let mut path = String::with_capacity(name.len() + extension.len());
    path.push_str(name);
    path.push_str(extension);
    path
}
