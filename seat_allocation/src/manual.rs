/*!

This is the long-form manual for `seat_allocation` and `escrutinio`.

## Data model

A dataset is a list of constituencies (circunscripciones). Each one carries the
number of seats to fill, the census and the vote counts:

| field         | meaning                                              |
|---------------|------------------------------------------------------|
| `codcir`      | constituency identifier, unique in the dataset       |
| `nombre`      | optional name                                        |
| `diputados`   | seats to fill                                        |
| `censo`       | registered electors                                  |
| `validos`     | valid votes (party votes + blank votes), optional    |
| `blancos`     | blank votes                                          |
| `nulos`       | null votes                                           |
| `votos`       | total votes (valid + null), optional                 |
| `abstencion`  | census minus total votes, optional and recomputed    |
| `partidos`    | votes per party label                                |

Party labels are compared exactly, including case. There is no national
registry of parties: the same party may use different labels in different
constituencies, or be absent from some of them.

## Input formats

### `yaml`

One YAML document per constituency. This is also the format written by
`escrutinio --convert`.

```yaml
codcir: 4
nombre: Almería
diputados: 12
censo: 481235
blancos: 2171
nulos: 3520
partidos:
  PP: 88643
  PSOE-A: 79113
  VOX: 40239
---
codcir: 11
...
```

### `xlsx`

Spreadsheets as exported by the ministry for general elections, one row per
province. The first header rows hold the party names and their
abbreviations, followed by the row with the column names. When a `Diputados`
column is present, every party has two columns: votes and seats won.

### `csv`

Polling station (`mesas`) and municipality (`municipios`) results, separated by
`;`, encoded in ISO-8859-1. Rows are added up per `Codcir`. The seats and names
of the constituencies come from a separate YAML file (`--info`) with `codcir`,
`nombre` and `diputados` entries.

## Apportionment

Seats are awarded in each constituency with the D'Hondt method:

1. The base is the sum of the votes of all the parties plus the blank votes.
2. Parties below the threshold share of the base (3% by default) are left out,
   as are parties with no votes.
3. Every remaining party gets the quotients `votes / 1`, `votes / 2`, ...,
   `votes / seats`, and the largest `seats` quotients each win one seat.
4. Equal quotients go to the party with the most votes, then to the party
   whose label comes first in byte order.

Blank votes make it harder to reach the threshold but never win seats.

## Scenarios

Scenarios always start from the loaded data:

* `joins` merge lists of labels. In `["PP", "Cs"]`, the votes of `Cs` go to `PP`
  and `Cs` disappears. Labels that are absent from a constituency are skipped
  there.
* `blankVotes`, `nullVotes` and `abstention` (a fraction) give extra votes to the
  first label of the first join, in the constituencies where it is present.
* `spreadAbstention` gives a fraction of the abstention, in equal parts, to all
  the parties except the `exclude`d ones.
* `threshold` overrides the threshold for this scenario.

```json
{
  "outputSettings": { "contestName": "Parlamento de Andalucía 2018" },
  "dataSources": [ { "provider": "yaml", "filePath": "circunscripciones.yml" } ],
  "rules": { "threshold": "3%" },
  "scenarios": [
    { "name": "base", "detail": true },
    { "name": "right", "joins": [["VOX", "FE de las JONS"]] },
    { "name": "turnout", "joins": ["ADELANTE ANDALUCIA"], "blankVotes": true,
      "nullVotes": true, "abstention": 0.05 }
  ]
}
```

*/
