//! Configuration access port trait.

pub trait ConfigPort {
    /// Raw value of `key` in `section`, if present.
    fn get_string(&self, section: &str, key: &str) -> Option<String>;

    /// Keys present in `section`, sorted. Empty when the section is absent.
    fn keys(&self, section: &str) -> Vec<String>;
}
