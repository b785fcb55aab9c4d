use std::rc::Rc;

/// A persistent stack: pushing returns a new stack that shares its tail with the original.
#[derive(Clone, Eq, Hash, PartialEq)]
pub struct Stack<T: Clone + Eq + PartialEq> {
    head: Option<Rc<StackNode<T>>>,
}

#[derive(Clone, Eq, Hash, PartialEq)]
struct StackNode<T: Clone + Eq + PartialEq> {
    datum: T,
    next: Option<Rc<StackNode<T>>>,
}

impl<T: Clone + Eq + PartialEq> Stack<T> {
    pub fn new() -> Stack<T> {
        Stack { head: None }
    }

    pub fn push(&self, datum: T) -> Stack<T> {
        Stack {
            head: Some(Rc::new(StackNode {
                datum,
                next: self.head.clone(),
            })),
        }
    }

    /// Iterates from the most recently pushed element down to the bottom of the stack.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        let mut node = self.head.as_deref();
        std::iter::from_fn(move || {
            let current = node?;
            node = current.next.as_deref();
            Some(&current.datum)
        })
    }

    /// Returns the elements from the bottom of the stack up.
    pub fn to_vec(&self) -> Vec<T> {
        let mut ret = self.iter().cloned().collect::<Vec<_>>();
        ret.reverse();
        ret
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pushes_share_tails() {
        let root = Stack::new().push(1).push(2);
        let a = root.push(3);
        let b = root.push(4);

        assert_eq!(a.to_vec(), vec![1, 2, 3]);
        assert_eq!(b.to_vec(), vec![1, 2, 4]);
        assert_eq!(root.iter().copied().collect::<Vec<_>>(), vec![2, 1]);
        assert!(Stack::<u32>::new().iter().next().is_none());
    }
}
