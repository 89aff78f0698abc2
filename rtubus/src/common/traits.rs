use scursor::WriteCursor;

use crate::error::RequestError;

pub(crate) trait Serialize {
    fn serialize(&self, cursor: &mut WriteCursor) -> Result<(), RequestError>;
}
