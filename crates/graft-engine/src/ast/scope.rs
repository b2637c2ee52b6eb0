//! Lexical scopes
//!
//! The scope chain the front end maintains while parsing. The capture
//! builder walks it outward from the point where a fragment starts.

use super::decl::DeclId;

/// Scope identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u32);

/// Scope kind
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Translation unit scope
    TranslationUnit,
    /// Namespace scope
    Namespace,
    /// Class scope
    Class,
    /// Function parameter and body scope
    Function,
    /// Block scope
    Block,
    /// Fragment scope
    Fragment,
}

/// A scope in the scope tree
#[derive(Debug, Clone)]
pub struct Scope {
    /// Scope ID
    pub id: ScopeId,
    /// Scope kind
    pub kind: ScopeKind,
    /// Parent scope (None for the translation unit scope)
    pub parent: Option<ScopeId>,
    /// The declaration this scope belongs to, if any (blocks have none)
    pub entity: Option<DeclId>,
    /// Declarations made in this scope, in order
    pub decls: Vec<DeclId>,
}

/// Scope tree with a current scope
#[derive(Debug, Clone)]
pub struct ScopeTree {
    scopes: Vec<Scope>,
    current: ScopeId,
}

impl Default for ScopeTree {
    fn default() -> Self {
        Self::new()
    }
}

impl ScopeTree {
    /// A tree holding only the translation unit scope
    pub fn new() -> Self {
        Self {
            scopes: vec![Scope {
                id: ScopeId(0),
                kind: ScopeKind::TranslationUnit,
                parent: None,
                entity: Some(DeclId::TRANSLATION_UNIT),
                decls: Vec::new(),
            }],
            current: ScopeId(0),
        }
    }

    /// Enter a new scope nested in the current one
    pub fn push(&mut self, kind: ScopeKind, entity: Option<DeclId>) -> ScopeId {
        let id = ScopeId(self.scopes.len() as u32);
        self.scopes.push(Scope {
            id,
            kind,
            parent: Some(self.current),
            entity,
            decls: Vec::new(),
        });
        self.current = id;
        id
    }

    /// Leave the current scope. The translation unit scope is never left.
    pub fn pop(&mut self) {
        if let Some(parent) = self.scopes[self.current.0 as usize].parent {
            self.current = parent;
        }
    }

    /// The current scope
    pub fn current(&self) -> ScopeId {
        self.current
    }

    /// Get a scope
    pub fn get(&self, id: ScopeId) -> &Scope {
        &self.scopes[id.0 as usize]
    }

    /// Record a declaration in the current scope
    pub fn declare(&mut self, decl: DeclId) {
        let current = self.current.0 as usize;
        self.scopes[current].decls.push(decl);
    }

    /// The parent of a scope
    pub fn parent(&self, id: ScopeId) -> Option<ScopeId> {
        self.get(id).parent
    }
}
