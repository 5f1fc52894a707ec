//! Ambient acting identity.
//!
//! Inside [`AmbientSecurityContext::scope`] the identity lives in a
//! `tokio::task_local!` stack. A tokio task running outside any scope gets a
//! stack of its own keyed by its task id, so sibling tasks sharing a worker
//! thread never see each other's values. Code outside any task uses a plain
//! thread-local stack. Tasks start empty: nothing set on the spawning thread
//! or task is inherited unless the future is wrapped with
//! [`propagate`](AmbientSecurityContext::propagate).
//!
//! [`set_context`](AmbientSecurityContext::set_context) pushes onto whichever
//! stack is active and returns a [`ContextScope`] guard whose drop restores
//! the previous value.
//!
//! ```text
//!   let _outer = set_context(X)   stack=[X]        current=X
//!   let _inner = set_context(Y)   stack=[X, Y]     current=Y
//!   drop(_inner)                  stack=[X]        current=X
//! ```

use std::cell::RefCell;
use std::future::Future;
use std::marker::PhantomData;

use ahash::AHashMap;
use tokio::task::Id as TaskId;
use tracing::trace;

use crate::types::Identity;

tokio::task_local! {
    static TASK_STACK: RefCell<Vec<Identity>>;
}

thread_local! {
    static THREAD_STACK: RefCell<Vec<Identity>> = const { RefCell::new(Vec::new()) };
    // Tasks polled on this thread, keyed by id. Entries are removed once empty.
    static TASK_STACKS: RefCell<AHashMap<TaskId, Vec<Identity>>> =
        RefCell::new(AHashMap::new());
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stack {
    Scoped,
    Task(TaskId),
    Thread,
}

impl Stack {
    /// The stack `set_context` would push onto right now.
    fn active() -> Self {
        if TASK_STACK.try_with(|_| ()).is_ok() {
            Stack::Scoped
        } else if let Some(id) = tokio::task::try_id() {
            Stack::Task(id)
        } else {
            Stack::Thread
        }
    }

    fn push(self, identity: Identity) -> usize {
        let push = |s: &mut Vec<Identity>| {
            s.push(identity);
            s.len() - 1
        };
        match self {
            Stack::Scoped => TASK_STACK.with(|s| push(&mut s.borrow_mut())),
            Stack::Task(id) => TASK_STACKS.with(|m| push(m.borrow_mut().entry(id).or_default())),
            Stack::Thread => THREAD_STACK.with(|s| push(&mut s.borrow_mut())),
        }
    }

    fn last(self) -> Option<Identity> {
        match self {
            Stack::Scoped => TASK_STACK.with(|s| s.borrow().last().copied()),
            Stack::Task(id) => {
                TASK_STACKS.with(|m| m.borrow().get(&id).and_then(|s| s.last().copied()))
            }
            Stack::Thread => THREAD_STACK.with(|s| s.borrow().last().copied()),
        }
    }

    // try_with: the stack may already be gone during thread or task teardown.
    fn truncate(self, depth: usize) {
        match self {
            Stack::Scoped => {
                let _ = TASK_STACK.try_with(|s| s.borrow_mut().truncate(depth));
            }
            Stack::Task(id) => {
                let _ = TASK_STACKS.try_with(|m| {
                    let mut m = m.borrow_mut();
                    if let Some(s) = m.get_mut(&id) {
                        s.truncate(depth);
                        if s.is_empty() {
                            m.remove(&id);
                        }
                    }
                });
            }
            Stack::Thread => {
                let _ = THREAD_STACK.try_with(|s| s.borrow_mut().truncate(depth));
            }
        }
    }
}

/// Guard returned by [`AmbientSecurityContext::set_context`].
///
/// Dropping it truncates the stack it pushed onto back to the depth it saw,
/// which also discards anything pushed later in the same task and not yet
/// dropped. Not `Send`: a guard must be dropped on the thread (and in the
/// task) that created it, which also keeps a task holding one from migrating
/// between worker threads.
#[must_use = "the identity is reverted when the guard is dropped"]
#[derive(Debug)]
pub struct ContextScope {
    stack: Stack,
    depth: usize,
    _not_send: PhantomData<*const ()>,
}

impl Drop for ContextScope {
    fn drop(&mut self) {
        self.stack.truncate(self.depth);
    }
}

/// Accessors for the identity permission checks run as.
pub struct AmbientSecurityContext;

impl AmbientSecurityContext {
    /// Make `identity` current until the returned guard drops.
    pub fn set_context(identity: Identity) -> ContextScope {
        let stack = Stack::active();
        let depth = stack.push(identity);
        trace!(%identity, ?stack, depth, "ambient identity set");
        ContextScope {
            stack,
            depth,
            _not_send: PhantomData,
        }
    }

    /// The innermost identity, if any has been set.
    pub fn current() -> Option<Identity> {
        Stack::active().last()
    }

    /// The current identity, or [`Identity::System`] when none is set.
    pub fn get_or_create_default() -> Identity {
        Self::current().unwrap_or(Identity::System)
    }

    /// Run `fut` with its own identity stack starting at `identity`.
    pub async fn scope<F: Future>(identity: Identity, fut: F) -> F::Output {
        TASK_STACK.scope(RefCell::new(vec![identity]), fut).await
    }

    /// Run `f` with its own identity stack starting at `identity`.
    pub fn sync_scope<F, R>(identity: Identity, f: F) -> R
    where
        F: FnOnce() -> R,
    {
        TASK_STACK.sync_scope(RefCell::new(vec![identity]), f)
    }

    /// Wrap `fut` so it runs under the identity current at call time.
    /// Use before `tokio::spawn`: spawned tasks do not inherit task-locals.
    pub fn propagate<F: Future>(fut: F) -> impl Future<Output = F::Output> {
        let inherited = Self::current();
        async move {
            match inherited {
                Some(identity) => Self::scope(identity, fut).await,
                None => fut.await,
            }
        }
    }
}
