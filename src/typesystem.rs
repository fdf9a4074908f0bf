//! Types and entities (§3 "Entities in a compound type...", §4.4 Verifier).
//!
//! This is the "Type & Entity" component from the overview: method types,
//! compound types, and the entity kinds (normal/method/parameter/alias/
//! label/compound member) that the verifier in `crate::verify` checks for
//! consistent linkage, owner and type. A `Program` (see `crate::program`)
//! owns exactly one `TypeSystem`, the same way it owns exactly one
//! `ModeRegistry`: both are process-wide, append-only tables.

use crate::entity::{entity_impl, PrimaryMap};
use crate::ir::graph::GraphId;
use crate::mode::Mode;
use crate::tarval::Tarval;

/// A dense reference to a `TypeData` owned by a `TypeSystem`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);
entity_impl!(TypeId);

/// A dense reference to an `EntityData` owned by a `TypeSystem`.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(u32);
entity_impl!(EntityId);

/// Struct/union/class discriminator for `TypeKind::Compound`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum CompoundKind {
    Struct,
    Union,
    Class,
}

/// The kind of a type.
#[derive(Clone, Debug)]
pub enum TypeKind {
    /// A scalar value type: the type of the value *is* its mode.
    Primitive(Mode),
    /// A pointer to `to`.
    Pointer { to: TypeId },
    /// A method's signature. `is_lowered` is set once the doubleword pass
    /// has expanded every doubleword parameter/result into a low/high pair,
    /// making the rewrite idempotent (§4.2 "Method-type lowering").
    Method {
        params: Vec<TypeId>,
        results: Vec<TypeId>,
        is_lowered: bool,
        variadic: bool,
    },
    /// An array of `element`, with at least one dimension bound (§4.4: "array
    /// dimensions have at least one bound").
    Array { element: TypeId, bounds: Vec<u64> },
    /// A struct/union/class; `members` are `EntityId`s of `EntityKind::CompoundMember`.
    Compound {
        kind: CompoundKind,
        members: Vec<EntityId>,
    },
    /// The type of a `Label` entity (a jump target outside any graph).
    Label,
}

/// A type owned by a `TypeSystem`.
#[derive(Clone, Debug)]
pub struct TypeData {
    pub kind: TypeKind,
}

impl TypeData {
    /// The mode a value of this type has, for the kinds that have one
    /// (§4.4: "primitives and pointers have a mode").
    pub fn mode(&self) -> Option<Mode> {
        match &self.kind {
            TypeKind::Primitive(m) => Some(*m),
            TypeKind::Pointer { .. } => Some(Mode::Reference),
            _ => None,
        }
    }
}

/// Special-method markers for §4.4's "constructors/destructors have
/// `hidden-user` linkage and empty `ld_name`" check.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SpecialMethod {
    Constructor,
    Destructor,
}

/// The kind of an entity.
#[derive(Clone, Debug)]
pub enum EntityKind {
    /// An ordinary global (data) entity.
    Normal,
    /// A method; `graph` is `Some` iff the method has a body, in which case
    /// that graph's `entity` field must point back to this entity (§3).
    Method {
        graph: Option<GraphId>,
        special: Option<SpecialMethod>,
        /// Class methods this one overrides; only meaningful for
        /// `Class`-compound members (§4.4 "class members do not over-override").
        overrides: Vec<EntityId>,
    },
    /// A formal parameter; valid only for entities owned by a graph's frame
    /// type (§4.4 "parameter only in frame").
    Parameter { num: u32 },
    /// An alias for another entity; valid only in a segment (§4.4 "alias
    /// only in segments").
    Alias { aliasee: EntityId },
    /// A jump-target label; valid only with `TypeKind::Label` (§4.4 "label
    /// only with code type").
    Label,
    /// A member of a compound type.
    CompoundMember,
}

/// Visibility, independent of linkage flags.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Visibility {
    Local,
    External,
}

/// Linkage flags, each independently toggleable.
#[derive(Clone, Copy, Default, Debug)]
pub struct Linkage {
    pub constant: bool,
    pub weak: bool,
    pub merge: bool,
    pub hidden_user: bool,
    pub no_codegen: bool,
}

/// Which segment an entity's storage lives in.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Segment {
    Global,
    ThreadLocal,
}

/// An initializer value attached to an entity.
#[derive(Clone, Debug)]
pub enum Initializer {
    /// A single scalar constant; must match the entity's type's mode (§4.4).
    Const(Tarval),
    /// A compound initializer; one element per compound member, in order.
    Compound(Vec<Initializer>),
    /// All-zero initialization.
    Zero,
}

/// An entity owned by a `TypeSystem`.
#[derive(Clone, Debug)]
pub struct EntityData {
    pub kind: EntityKind,
    /// The compound type (or frame/segment type) this entity is a member
    /// of, if any.
    pub owner: Option<TypeId>,
    /// This entity's own type (e.g. a method entity's `Method` type, a
    /// parameter's primitive type).
    pub ty: TypeId,
    pub linkage: Linkage,
    pub visibility: Visibility,
    pub ld_name: Option<String>,
    pub initializer: Option<Initializer>,
    pub segment: Segment,
}

/// Owns every type and entity in the program (the "Type & Entity" component).
pub struct TypeSystem {
    types: PrimaryMap<TypeId, TypeData>,
    entities: PrimaryMap<EntityId, EntityData>,
    /// The compound type holding every `Normal`/`Method` entity in `Segment::Global`.
    pub global_type: TypeId,
    /// The compound type holding thread-local entities.
    pub tls_type: TypeId,
    /// The dedicated graph whose `Const` nodes are the only ones legally
    /// usable as an entity initializer value (§3's "const-code" graph).
    pub const_code_graph: Option<GraphId>,
}

impl TypeSystem {
    /// Create a fresh type system with empty global/TLS compound types.
    pub fn new() -> Self {
        let mut types = PrimaryMap::new();
        let global_type = types.push(TypeData {
            kind: TypeKind::Compound {
                kind: CompoundKind::Struct,
                members: Vec::new(),
            },
        });
        let tls_type = types.push(TypeData {
            kind: TypeKind::Compound {
                kind: CompoundKind::Struct,
                members: Vec::new(),
            },
        });
        TypeSystem {
            types,
            entities: PrimaryMap::new(),
            global_type,
            tls_type,
            const_code_graph: None,
        }
    }

    /// Allocate a new type.
    pub fn add_type(&mut self, kind: TypeKind) -> TypeId {
        self.types.push(TypeData { kind })
    }

    /// Allocate a new entity. If `owner` names a compound type, the entity
    /// is also appended to that compound's `members` list so the two stay
    /// consistent (§4.4 "compound members owned by the compound").
    pub fn add_entity(&mut self, data: EntityData) -> EntityId {
        let owner = data.owner;
        let id = self.entities.push(data);
        if let Some(owner_ty) = owner {
            if let TypeKind::Compound { members, .. } = &mut self.types[owner_ty].kind {
                members.push(id);
            }
        }
        id
    }

    pub fn ty(&self, id: TypeId) -> &TypeData {
        &self.types[id]
    }

    pub fn ty_mut(&mut self, id: TypeId) -> &mut TypeData {
        &mut self.types[id]
    }

    pub fn entity(&self, id: EntityId) -> &EntityData {
        &self.entities[id]
    }

    pub fn entity_mut(&mut self, id: EntityId) -> &mut EntityData {
        &mut self.entities[id]
    }

    /// Visit every type, then every entity, in allocation order — the
    /// "type/entity walk" named in §4.1.
    pub fn walk(&self, mut on_type: impl FnMut(TypeId, &TypeData), mut on_entity: impl FnMut(EntityId, &EntityData)) {
        for (id, ty) in self.types.iter() {
            on_type(id, ty);
        }
        for (id, ent) in self.entities.iter() {
            on_entity(id, ent);
        }
    }

    pub fn type_ids(&self) -> impl Iterator<Item = TypeId> + '_ {
        self.types.keys()
    }

    pub fn entity_ids(&self) -> impl Iterator<Item = EntityId> + '_ {
        self.entities.keys()
    }
}

impl Default for TypeSystem {
    fn default() -> Self {
        Self::new()
    }
}
