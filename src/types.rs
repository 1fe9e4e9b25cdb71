use bitflags::bitflags;
use serde::Serialize;
use serde::Serializer;
use std::fmt;

bitflags! {
  /// A conservative over-approximation of the runtime type of a JS value,
  /// represented as a set of type tags. The empty set means "no type has been
  /// inferred yet" and is only a valid final state for instructions without an
  /// output. The full set is the unknown type.
  ///
  /// INT32 and UINT32 are narrowings of NUMBER that some operators guarantee
  /// (`~`, `%`, `>>>`, int coercion). NUMBER is a composite flag covering
  /// both narrowings plus a general-number bit, which makes the subtype
  /// relation a plain bitwise one: intersecting a narrowed number with
  /// NUMBER keeps the narrowing, while unioning a narrowing with a
  /// non-number never silently widens to NUMBER.
  #[derive(Clone, Copy, PartialEq, Eq, Hash, Debug)]
  pub struct Type: u16 {
    /// Value of a let/const binding before initialization.
    const EMPTY = 1 << 0;
    const UNDEFINED = 1 << 1;
    const NULL = 1 << 2;
    const BOOLEAN = 1 << 3;
    const STRING = 1 << 4;
    const INT32 = 1 << 6;
    const UINT32 = 1 << 7;
    const NUMBER = (1 << 5) | (1 << 6) | (1 << 7);
    const BIGINT = 1 << 8;
    const OBJECT = 1 << 9;
    /// Closure scope record. Never the type of a user-visible value.
    const ENVIRONMENT = 1 << 10;
  }
}

// Coercing these tags to a primitive cannot invoke user code. Objects call
// valueOf/toString, and strings are excluded so `+` keeps its string branch.
const SIDE_EFFECT_FREE_BITS: Type = Type::UNDEFINED
  .union(Type::NULL)
  .union(Type::BOOLEAN)
  .union(Type::NUMBER)
  .union(Type::BIGINT);

impl Type {
  /// The bottom element: no type inferred.
  pub const fn no_type() -> Type {
    Type::empty()
  }

  /// The top element: any runtime type.
  pub const fn any() -> Type {
    Type::all()
  }

  pub fn is_no_type(self) -> bool {
    self.is_empty()
  }

  pub fn is_any(self) -> bool {
    self == Type::all()
  }

  pub fn is_subset_of(self, other: Type) -> bool {
    other.contains(self)
  }

  /// True when every value of this type is a number (NUMBER, INT32, UINT32).
  pub fn is_number_type(self) -> bool {
    !self.is_empty() && Type::NUMBER.contains(self)
  }

  pub fn is_string_type(self) -> bool {
    !self.is_empty() && Type::STRING.contains(self)
  }

  pub fn is_bigint_type(self) -> bool {
    !self.is_empty() && Type::BIGINT.contains(self)
  }

  pub fn can_be_number(self) -> bool {
    self.intersects(Type::NUMBER)
  }

  pub fn can_be_string(self) -> bool {
    self.intersects(Type::STRING)
  }

  pub fn can_be_bigint(self) -> bool {
    self.intersects(Type::BIGINT)
  }

  pub fn can_be_object(self) -> bool {
    self.intersects(Type::OBJECT)
  }

  pub fn can_be_empty(self) -> bool {
    self.intersects(Type::EMPTY)
  }

  /// True when converting a value of this type to a primitive cannot run user
  /// code (no valueOf/toString dispatch).
  pub fn is_side_effect_free(self) -> bool {
    !self.is_empty() && SIDE_EFFECT_FREE_BITS.contains(self)
  }
}

impl fmt::Display for Type {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    if self.is_no_type() {
      return write!(f, "notype");
    }
    if self.is_any() {
      return write!(f, "any");
    }
    let mut parts = Vec::new();
    const SIMPLE: [(Type, &str); 5] = [
      (Type::EMPTY, "empty"),
      (Type::UNDEFINED, "undefined"),
      (Type::NULL, "null"),
      (Type::BOOLEAN, "boolean"),
      (Type::STRING, "string"),
    ];
    for (bit, name) in SIMPLE {
      if self.contains(bit) {
        parts.push(name);
      };
    }
    if self.contains(Type::NUMBER) {
      parts.push("number");
    } else {
      if self.contains(Type::INT32) {
        parts.push("int32");
      };
      if self.contains(Type::UINT32) {
        parts.push("uint32");
      };
    }
    const TAIL: [(Type, &str); 3] = [
      (Type::BIGINT, "bigint"),
      (Type::OBJECT, "object"),
      (Type::ENVIRONMENT, "environment"),
    ];
    for (bit, name) in TAIL {
      if self.contains(bit) {
        parts.push(name);
      };
    }
    write!(f, "{}", parts.join("|"))
  }
}

impl Serialize for Type {
  fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&self.to_string())
  }
}
