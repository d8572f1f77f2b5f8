use bevy::platform::collections::HashMap;

/// 动画参数表
///
/// Free-form named float parameters, unset names read as `0.0`
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Parameters(HashMap<String, f32>);

impl Parameters {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> f32 {
        self.0.get(name).copied().unwrap_or(0.0)
    }

    pub fn set(&mut self, name: impl Into<String>, value: f32) -> Option<f32> {
        self.0.insert(name.into(), value)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn remove(&mut self, name: &str) -> Option<f32> {
        self.0.remove(name)
    }

    pub fn clear(&mut self) {
        self.0.clear();
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f32)> {
        self.0.iter().map(|(k, v)| (k.as_str(), *v))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unset_reads_zero() {
        let mut params = Parameters::new();
        assert_eq!(params.get("speed"), 0.0);
        assert_eq!(params.set("speed", 2.5), None);
        assert_eq!(params.set("speed", 3.0), Some(2.5));
        assert_eq!(params.get("speed"), 3.0);
        params.clear();
        assert!(params.is_empty());
        assert_eq!(params.get("speed"), 0.0);
    }
}
