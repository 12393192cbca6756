/// A key-value pair stored inside a tree node.
#[derive(Debug)]
pub struct Entry<T, U> {
    pub key: T,
    pub value: U,
}

impl<T, U> Entry<T, U> {
    pub fn new(key: T, value: U) -> Self {
        Entry { key, value }
    }

    pub fn into_pair(self) -> (T, U) {
        (self.key, self.value)
    }

    pub fn as_pair(&self) -> (&T, &U) {
        (&self.key, &self.value)
    }

    pub fn as_pair_mut(&mut self) -> (&T, &mut U) {
        let Entry { ref key, ref mut value } = self;
        (key, value)
    }
}
